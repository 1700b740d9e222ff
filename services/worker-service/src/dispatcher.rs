use crate::error::ValidationError;
use crate::generation::GenerationProcessor;
use crate::models::{GenerationRequest, RefinementRequest, TaskMessage, TaskType};
use crate::processor::TaskLifecycle;
use crate::refinement::RefinementProcessor;
use crate::services::Services;

/// Outermost boundary for one queued message. Decode failures are logged and
/// dropped here so a poison message can never crash the worker.
pub async fn handle_message(services: &Services, payload: serde_json::Value) {
    let message: TaskMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(err) => {
            tracing::error!(error = %err, "discarding undecodable task message");
            return;
        }
    };
    dispatch(services, message).await;
}

/// Validate the message for its declared task type and hand it to the
/// matching processor. Validation failures are never retried: the task is
/// failed immediately and no processor runs.
pub async fn dispatch(services: &Services, message: TaskMessage) {
    match message.task_type.parse::<TaskType>() {
        Ok(TaskType::Generation) => match GenerationRequest::from_message(&message) {
            Ok(request) => GenerationProcessor::new(services, request).run().await,
            Err(err) => fail_invalid(services, &message, err).await,
        },
        Ok(TaskType::Refinement) => match RefinementRequest::from_message(&message) {
            Ok(request) => RefinementProcessor::new(services, request).run().await,
            Err(err) => fail_invalid(services, &message, err).await,
        },
        Err(()) => {
            let err = ValidationError::UnknownTaskType(message.task_type.clone());
            fail_invalid(services, &message, err).await;
        }
    }
}

async fn fail_invalid(services: &Services, message: &TaskMessage, err: ValidationError) {
    tracing::error!(
        task_id = %message.task_id,
        task_type = message.task_type.as_str(),
        error = %err,
        "task message failed validation"
    );
    let lifecycle = TaskLifecycle::new(services.tasks.clone(), message.task_id, message.user_id);
    lifecycle.fail(&err.to_string()).await;
}
