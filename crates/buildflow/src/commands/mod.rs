pub mod deploy;

use buildflow_pipeline::PipelineError;

/// Message shown to the user for a failed command
pub fn error_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<PipelineError>() {
        Some(e) => e.user_message(),
        None => format!("{:#}", error),
    }
}
