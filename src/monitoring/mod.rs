/*!
 * Monitoring
 * Structured logging for benchmark runs
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, ENV_TRACE_JSON};
