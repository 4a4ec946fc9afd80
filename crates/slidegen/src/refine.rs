use crate::completion::CompletionService;
use slidegen_core::refine::{
    build_refinement_prompt, finish_refinement, needs_refinement, RefinementOptions,
    RefinementOutcome, REFINEMENT_SYSTEM_INSTRUCTION,
};

/// Refine `content` for a slide, keeping the original on any failure.
pub async fn refine_content<C: CompletionService>(
    completion: &mut C,
    field_name: &str,
    content: &str,
    options: &RefinementOptions,
) -> RefinementOutcome {
    if !needs_refinement(content, options) {
        return RefinementOutcome::Skipped(content.to_string());
    }

    let prompt = build_refinement_prompt(field_name, content, options);
    let response = completion
        .complete(&prompt, REFINEMENT_SYSTEM_INSTRUCTION)
        .await;
    let outcome = finish_refinement(content, response);

    match &outcome {
        RefinementOutcome::Refined(text) => log::debug!(
            "Refined '{}' from {} to {} chars",
            field_name,
            content.chars().count(),
            text.chars().count()
        ),
        RefinementOutcome::Fallback { reason, .. } => {
            log::warn!("Refinement of '{}' failed, keeping original: {}", field_name, reason)
        }
        RefinementOutcome::Skipped(_) => {}
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::tests::ScriptedCompletion;
    use crate::completion::CompletionError;

    const LONG: &str = "Acme builds reusable rockets for small satellite operators worldwide.";

    #[tokio::test]
    async fn test_refined_output_is_trimmed() {
        let mut completion = ScriptedCompletion::new(vec![Ok("  Reusable smallsat rockets.\n".to_string())]);
        let outcome =
            refine_content(&mut completion, "description", LONG, &RefinementOptions::default())
                .await;
        assert_eq!(
            outcome,
            RefinementOutcome::Refined("Reusable smallsat rockets.".to_string())
        );

        let (prompt, system) = &completion.prompts[0];
        assert!(prompt.contains("(Field: description)"));
        assert!(prompt.contains(LONG));
        assert_eq!(system, REFINEMENT_SYSTEM_INSTRUCTION);
    }

    #[tokio::test]
    async fn test_short_content_skips_the_service() {
        let mut completion = ScriptedCompletion::default();
        let outcome =
            refine_content(&mut completion, "description", "Rockets", &RefinementOptions::default())
                .await;
        assert_eq!(outcome, RefinementOutcome::Skipped("Rockets".to_string()));
        assert!(completion.prompts.is_empty());

        let options = RefinementOptions {
            force_refinement: true,
            ..RefinementOptions::default()
        };
        let mut completion = ScriptedCompletion::new(vec![Ok("ROCKETS".to_string())]);
        let outcome = refine_content(&mut completion, "name", "Rockets", &options).await;
        assert_eq!(outcome.text(), "ROCKETS");
    }

    #[tokio::test]
    async fn test_exhausted_credentials_return_original() {
        let mut completion =
            ScriptedCompletion::new(vec![Err(CompletionError::Exhausted { attempts: 3 })]);
        let outcome =
            refine_content(&mut completion, "description", LONG, &RefinementOptions::default())
                .await;
        assert!(matches!(outcome, RefinementOutcome::Fallback { .. }));
        assert_eq!(outcome.into_text(), LONG);
    }

    #[tokio::test]
    async fn test_blank_completion_returns_original() {
        let mut completion = ScriptedCompletion::new(vec![Ok("   ".to_string())]);
        let outcome =
            refine_content(&mut completion, "description", LONG, &RefinementOptions::default())
                .await;
        assert_eq!(outcome.text(), LONG);
    }
}
