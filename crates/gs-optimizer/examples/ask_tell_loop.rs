//! Drives the orchestrator the way a remote client would: initialize, evaluate
//! locally, send the full history back, repeat.
//!
//! ```text
//! cargo run -p gs-optimizer --example ask_tell_loop -- SKOPT-GP
//! ```

use gs_optimizer::{ContinueRequest, InitRequest, Orchestrator};
use gs_types::{GsResult, OptimizerSettings, ParameterRecord};
use serde_json::Value;
use tracing::info;

fn branin(x: f64, y: f64) -> f64 {
    let pi = std::f64::consts::PI;
    let b = 5.1 / (4.0 * pi * pi);
    let c = 5.0 / pi;
    let t = 1.0 / (8.0 * pi);
    (y - b * x * x + c * x - 6.0).powi(2) + 10.0 * (1.0 - t) * x.cos() + 10.0
}

fn evaluate(points: Vec<ParameterRecord>) -> Vec<Value> {
    points
        .into_iter()
        .map(|p| {
            let x = p.get("x").unwrap_or_default();
            let y = p.get("y").unwrap_or_default();
            p.with_objective(branin(x, y)).into_value()
        })
        .collect()
}

fn best(history: &[Value]) -> f64 {
    history
        .iter()
        .filter_map(|r| r["objective"].as_f64())
        .fold(f64::INFINITY, f64::min)
}

fn main() -> GsResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let backend = std::env::args().nth(1).unwrap_or_else(|| "SKOPT-GP".to_string());
    let settings = OptimizerSettings::new(&backend)
        .with_parameter("x", -5.0, 10.0)
        .with_parameter("y", 0.0, 15.0)
        .with_num_init_points(8)
        .with_batch_size(4)
        .with_random_state(42);

    let orchestrator = Orchestrator::default();
    let init = orchestrator.initialize(InitRequest {
        settings: settings.clone(),
    })?;
    let mut history = evaluate(init.points);
    println!("{:>5} {:>10}  ({})", 0, best(&history), init.backend);

    for round in 1..=10 {
        let response = orchestrator.continue_optimization(ContinueRequest {
            settings: settings.clone().with_random_state(42 + round),
            existing_data: history.clone(),
        })?;
        history.extend(evaluate(response.points));
        info!(round, evaluated = history.len(), "round complete");
        println!("{:>5} {:>10.5}", round, best(&history));
    }

    println!("global minimum is 0.39789");
    Ok(())
}
