//! Debug console commands.
//!
//! Three commands, kept verbatim from the firmware so existing tooling
//! works unchanged:
//!
//! - `app_balance_render <field> [plot 1|2]` — select a field for the
//!   realtime data graph
//! - `app_balance_sample <field> <count>` — print N samples of a field
//! - `app_balance_experiment <field> <plot 1-6>` — stream a field to the
//!   experiments plot
//!
//! The console thread only writes command cells in [`Telemetry`]; the
//! controller task picks them up and produces the actual output through
//! [`drive_debug_outputs`].

use std::sync::Arc;

use glide_common::hal::{PlotSink, Printer};

use crate::telemetry::{DebugFields, Telemetry};

/// Command parser bound to a printer and a plot sink.
pub struct Console<P: Printer, S: PlotSink> {
    telemetry: Arc<Telemetry>,
    printer: P,
    plot: S,
}

impl<P: Printer, S: PlotSink> Console<P, S> {
    pub fn new(telemetry: Arc<Telemetry>, printer: P, plot: S) -> Self {
        Self {
            telemetry,
            printer,
            plot,
        }
    }

    /// Dispatch one console line.
    pub fn handle(&mut self, line: &str) {
        let args: heapless::Vec<&str, 5> = line.split_whitespace().take(5).collect();
        match args.first().copied() {
            Some("app_balance_render") => self.render(&args),
            Some("app_balance_sample") => self.sample(&args),
            Some("app_balance_experiment") => self.experiment(&args),
            Some(other) => {
                self.printer.print_line(&format!("Unknown command: {other}"));
            }
            None => {}
        }
    }

    fn render(&mut self, args: &[&str]) {
        if args.len() == 2 || args.len() == 3 {
            let field: u32 = args[1].parse().unwrap_or(0);
            let mut graph: u8 = 1;
            if args.len() == 3 {
                graph = args[2].parse().unwrap_or(1);
                if !(1..=2).contains(&graph) {
                    graph = 1;
                }
            }
            self.telemetry.set_render_field(graph, field);
        } else {
            self.printer
                .print_line("This command requires one or two argument(s).");
        }
    }

    fn sample(&mut self, args: &[&str]) {
        if args.len() == 3 {
            let field: u32 = args[1].parse().unwrap_or(0);
            let count: u32 = args[2].parse().unwrap_or(0);
            self.telemetry.arm_sampling(field, count);
        } else {
            self.printer
                .print_line("This command requires two arguments.");
        }
    }

    fn experiment(&mut self, args: &[&str]) {
        if args.len() == 3 {
            let field: u32 = args[1].parse().unwrap_or(0);
            let graph: usize = args[2].parse().unwrap_or(0);
            if (1..=6).contains(&graph) {
                self.telemetry.set_experiment_field(graph - 1, field);
            }
            self.plot.init("Microseconds", "Balance App Debug Data");
            for name in ["1", "2", "3", "4", "5", "6"] {
                self.plot.add_graph(name);
            }
        } else {
            self.printer
                .print_line("This command requires two arguments.");
        }
    }
}

/// Controller-task side: emit one tick's worth of sampling and experiment
/// output. Called after every tick with that tick's debug field values.
pub fn drive_debug_outputs(
    telemetry: &Telemetry,
    debug: &DebugFields,
    time_ms: f32,
    printer: &mut dyn Printer,
    plot: &mut dyn PlotSink,
) {
    if let Some(field) = telemetry.take_sample_slot() {
        printer.print_line(&format!("{:.6}", debug.select(field)));
    }
    for graph in 0..6 {
        let field = telemetry.experiment_field(graph);
        if field != 0 {
            plot.set_graph(graph);
            plot.send_points(time_ms, debug.select(field));
        }
    }
}
