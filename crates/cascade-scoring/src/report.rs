//! Feedback rendering for the search controller.
//!
//! Renders stage records and cascade reports as markdown that can be pasted
//! straight into the next mutation prompt. Helpers:
//! - fixed: Format a number with N decimals
//! - truncate: Cut long text (tracebacks) at a character budget

use cascade_core::StageResult;
use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext};
use serde::Serialize;

pub const STAGE_TEMPLATE: &str = "\
### {{stage}}: {{#if correctness}}correct{{else}}incorrect{{/if}}

- combined_score: {{fixed combined_score 4}}
{{#if (eq stage \"stage1\")}}
- quick_score: {{fixed quick_score 1}}
{{/if}}
{{#if cycles}}
- cycles: {{cycles}}
{{/if}}
{{#if speedup}}
- speedup: {{fixed speedup 3}}x
{{/if}}
{{#if error}}
- error ({{error_kind}}): {{error}}
{{/if}}
{{#if trace}}

```
{{truncate trace 2000}}
```
{{/if}}
";

pub const CASCADE_TEMPLATE: &str = "\
## Evaluation of {{candidate_hash}}

{{#each stages}}
{{#with result}}
{{> stage}}
{{/with}}
_{{latency_ms}} ms_

{{/each}}
**final combined_score: {{fixed final_result.combined_score 4}}**
";

/// Markdown renderer with the feedback templates registered
pub struct FeedbackRenderer<'a> {
    handlebars: Handlebars<'a>,
}

impl<'a> FeedbackRenderer<'a> {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_helper("fixed", Box::new(FixedHelper));
        handlebars.register_helper("truncate", Box::new(TruncateHelper));

        let _ = handlebars.register_partial("stage", STAGE_TEMPLATE);
        let _ = handlebars.register_template_string("stage", STAGE_TEMPLATE);
        let _ = handlebars.register_template_string("cascade", CASCADE_TEMPLATE);

        FeedbackRenderer { handlebars }
    }

    /// Replace the built-in templates
    pub fn with_templates(stage: &str, cascade: &str) -> Result<Self, String> {
        let mut renderer = Self::new();
        let hb = &mut renderer.handlebars;
        let template_error = |e: handlebars::TemplateError| format!("Template error: {}", e);
        hb.register_partial("stage", stage).map_err(template_error)?;
        hb.register_template_string("stage", stage).map_err(template_error)?;
        hb.register_template_string("cascade", cascade).map_err(template_error)?;
        Ok(renderer)
    }

    pub fn render_stage(&self, result: &StageResult) -> Result<String, String> {
        self.handlebars
            .render("stage", result)
            .map_err(|e| format!("Render error: {}", e))
    }

    /// Render anything shaped like a cascade report
    /// (`candidate_hash`, `stages[].{result, latency_ms}`, `final_result`).
    pub fn render_report<T: Serialize>(&self, report: &T) -> Result<String, String> {
        self.handlebars
            .render("cascade", report)
            .map_err(|e| format!("Render error: {}", e))
    }
}

impl Default for FeedbackRenderer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders one stage record with the default templates.
pub fn render_feedback(result: &StageResult) -> Result<String, String> {
    FeedbackRenderer::new().render_stage(result)
}

// ============================================================================
// Custom Helpers
// ============================================================================

/// `{{fixed value places}}` (10.0 with 4 places -> "10.0000")
struct FixedHelper;

impl HelperDef for FixedHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let value = h.param(0).and_then(|v| v.value().as_f64()).unwrap_or(0.0);
        let places = h.param(1).and_then(|v| v.value().as_u64()).unwrap_or(2) as usize;
        out.write(&format!("{:.*}", places, value))?;
        Ok(())
    }
}

/// Truncate text to a maximum number of characters
struct TruncateHelper;

impl HelperDef for TruncateHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
        let max_chars = h.param(1).and_then(|v| v.value().as_u64()).unwrap_or(2000) as usize;

        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => {
                out.write(&text[..cut])?;
                out.write("\n...")?;
            }
            None => out.write(text)?,
        }
        Ok(())
    }
}
