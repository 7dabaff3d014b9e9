//! Optimization dispatch and completion.

use std::sync::Arc;

use refine_providers::{GenerateRequest, GenerativeService};
use refine_types::{ApiKey, OptimizationRequest, OptimizationResult, SYSTEM_INSTRUCTION};

use crate::state::{Completion, OperationState, TriggerOutcome};
use crate::ui::{STATUS_FAILED, StatusKind};
use crate::App;

/// Run one optimization against the service. Every failure becomes a failed result.
pub(crate) async fn execute<S: GenerativeService>(
    service: &S,
    key: &ApiKey,
    request: OptimizationRequest,
) -> OptimizationResult {
    let generate = GenerateRequest {
        model_id: request.model_id.clone(),
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        user_text: request.source.clone(),
        temperature: request.temperature,
    };

    match service.generate(key, &generate).await {
        Ok(generation) => {
            OptimizationResult::succeeded(request, generation.text, generation.total_tokens)
        }
        Err(e) => {
            tracing::warn!(model = %request.model_id, "Optimization failed: {e}");
            OptimizationResult::failed(request, e)
        }
    }
}

impl<S: GenerativeService> App<S> {
    /// Validate the surface and dispatch one optimization.
    ///
    /// The busy surface is set before this returns; the result arrives later
    /// through [`App::process_completions`].
    pub fn trigger_optimization(&mut self) -> TriggerOutcome {
        if !self.state.is_idle() {
            return TriggerOutcome::Busy;
        }

        let source = self.input.text().trim();
        if source.is_empty() {
            return TriggerOutcome::EmptyInput;
        }
        let source = source.to_string();

        let Some(key) = self.credential.clone() else {
            self.open_key_prompt();
            return TriggerOutcome::CredentialMissing;
        };

        let Some(display_name) = self.selector.selected().map(ToString::to_string) else {
            return TriggerOutcome::NoModel;
        };
        let Some(model_id) = self.catalog.resolve(&display_name).map(ToString::to_string) else {
            tracing::debug!(model = %display_name, "Selected model is not dispatchable");
            return TriggerOutcome::NoModel;
        };

        self.state = OperationState::Dispatching {
            model: display_name.clone(),
        };
        self.trigger.set_busy();
        self.set_status(format!("Sending to {display_name}..."), StatusKind::Busy);

        let request = OptimizationRequest {
            source,
            model_id,
            temperature: self.temperature,
        };
        tracing::info!(
            model = %request.model_id,
            temperature = %request.temperature,
            "Dispatching optimization"
        );

        let service = Arc::clone(&self.service);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = execute(service.as_ref(), &key, request).await;
            let _ = tx.send(Completion::Optimization(result));
        });

        self.state = OperationState::AwaitingResult {
            model: display_name,
        };
        TriggerOutcome::Dispatched
    }

    pub(crate) fn finish_optimization(&mut self, result: OptimizationResult) {
        self.state = OperationState::Idle;
        self.trigger.restore();
        self.output.clone_from(&result.text);

        if !result.success {
            self.set_status(STATUS_FAILED, StatusKind::Error);
            return;
        }

        let tokens = result
            .tokens
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        self.set_status(format!("Success! Total Tokens: {tokens}"), StatusKind::Success);

        let OptimizationResult {
            text,
            tokens,
            request,
            ..
        } = result;
        self.history
            .record(&self.store, request.source, text, request.model_id, tokens);
        self.history_cursor = 0;
    }
}
