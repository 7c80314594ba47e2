use crate::engine::{Action, ResolvedTarget};
use crate::utils::config::AutofillProfile;

use super::context::FlowContext;

/// Placeholder for a required field, chosen by its type and name
pub fn placeholder_for<'p>(
    profile: &'p AutofillProfile,
    field_type: &str,
    field_name: &str,
) -> &'p str {
    let name = field_name.to_lowercase();
    let kind = field_type.to_lowercase();

    if name.contains("phone") || kind == "tel" {
        profile.phone.as_str()
    } else if name.contains("email") || kind == "email" {
        profile.email.as_str()
    } else if name.contains("name") {
        profile.name.as_str()
    } else if name.contains("experience") || name.contains("years") || kind == "number" {
        profile.years.as_str()
    } else {
        profile.fallback.as_str()
    }
}

/// Fills visible, empty required fields with placeholders
pub struct Autofill<'c, 'a> {
    ctx: &'c FlowContext<'a>,
    scope: Option<ResolvedTarget>,
}

impl<'c, 'a> Autofill<'c, 'a> {
    pub fn new(ctx: &'c FlowContext<'a>, scope: Option<ResolvedTarget>) -> Self {
        Self { ctx, scope }
    }

    /// Returns the number of fields filled. Errors only skip the field.
    pub async fn fill_required(&self) -> usize {
        let driver = self.ctx.driver;
        let executor = self.ctx.executor();
        let policy = self.ctx.policy();
        let mut filled = 0;

        for css in &self.ctx.profile.modal.required_fields {
            let selector = match self.scope {
                Some(ref scope) => scope.scoped(&format!("css={}", css)),
                None => format!("css={}", css),
            };
            let count = driver.count(&selector).await.unwrap_or(0);

            for i in 0..count {
                let field = ResolvedTarget::new(selector.clone(), i, 0, self.ctx.clock.now());
                let handle = field.handle();

                if !driver.is_visible(&handle).await.unwrap_or(false) {
                    continue;
                }
                match driver.input_value(&handle).await {
                    Ok(value) if value.trim().is_empty() => {}
                    Ok(_) => continue,
                    Err(e) => {
                        log::debug!("could not read {}: {:#}", handle, e);
                        continue;
                    }
                }

                if css.trim_start().starts_with("select") {
                    match driver.select_first_option(&handle).await {
                        Ok(true) => filled += 1,
                        Ok(false) => {}
                        Err(e) => log::debug!("could not pick an option in {}: {:#}", handle, e),
                    }
                    continue;
                }

                let field_type = driver
                    .attribute(&handle, "type")
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                let field_name = match driver.attribute(&handle, "name").await.ok().flatten() {
                    Some(name) if !name.is_empty() => name,
                    _ => driver
                        .attribute(&handle, "id")
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or_default(),
                };

                let value = placeholder_for(&self.ctx.config.autofill, &field_type, &field_name);
                let outcome = executor
                    .invoke(&field, &Action::Fill(value.to_string()), &policy)
                    .await;
                if outcome.is_done() {
                    log::debug!("filled required field '{}'", field_name);
                    filled += 1;
                }
            }
        }

        filled
    }
}
