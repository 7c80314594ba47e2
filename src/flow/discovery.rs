//! Job discovery loop
//!
//! Walks the result cards in order, skipping jobs already applied to and
//! jobs without an in-page apply control, and stops at the first
//! successful application.

use crate::engine::{Action, EngineResult, LocatorChain, ResolvedTarget};
use crate::report::types::ApplicationRecord;

use super::context::FlowContext;
use super::events::RunEvent;
use super::modal::ModalMachine;
use super::state::{CandidateStatus, DiscoveryOutcome, JobCandidate};

pub struct DiscoveryLoop<'c, 'a> {
    ctx: &'c FlowContext<'a>,
}

impl<'c, 'a> DiscoveryLoop<'c, 'a> {
    pub fn new(ctx: &'c FlowContext<'a>) -> Self {
        Self { ctx }
    }

    /// Only session failures escape; anything else fails the candidate
    pub async fn run(&self) -> EngineResult<DiscoveryOutcome> {
        let ctx = self.ctx;
        let jobs = &ctx.profile.jobs;

        let cards = match ctx.resolve(&jobs.card, &ctx.policy()).await.found() {
            Some(cards) => cards,
            None => {
                ctx.emitter.warn("No job cards on the results page");
                return Ok(DiscoveryOutcome::NoJobFound {
                    visited: Vec::new(),
                });
            }
        };

        let available = ctx.resolver().count(&cards).await;
        let limit = available.min(ctx.config.limits.max_candidates);
        ctx.emitter.info(format!(
            "{} job card(s) listed, inspecting up to {}",
            available, limit
        ));

        let mut visited = Vec::with_capacity(limit);
        for index in 0..limit {
            let card = cards.nth(index);
            let mut candidate = self.extract(index, &card).await;
            ctx.emitter.emit(RunEvent::CandidateStarted {
                index,
                label: candidate.label(),
            });

            let record = match self.visit(&card, &mut candidate).await {
                Ok(record) => record,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    candidate.mark(CandidateStatus::Failed {
                        reason: e.to_string(),
                    });
                    None
                }
            };

            ctx.emitter.emit(RunEvent::CandidateFinished {
                index,
                status: candidate.status.clone(),
            });
            visited.push(candidate);

            if let Some(record) = record {
                return Ok(DiscoveryOutcome::Applied { record, visited });
            }
        }

        Ok(DiscoveryOutcome::NoJobFound { visited })
    }

    /// Open one candidate and try to apply; a record means it was applied
    async fn visit(
        &self,
        card: &ResolvedTarget,
        candidate: &mut JobCandidate,
    ) -> EngineResult<Option<ApplicationRecord>> {
        let ctx = self.ctx;
        let jobs = &ctx.profile.jobs;
        let timeouts = &ctx.config.timeouts;
        let policy = ctx.policy();

        ctx.executor()
            .invoke(card, &Action::Click, &policy)
            .await
            .into_result(jobs.card.name())?;
        ctx.settle().await;

        let detail_policy = ctx.bounded_policy(timeouts.detail_panel_ms, &jobs.detail_panel);
        // apply controls elsewhere on the page (filter pills, other cards)
        // must never be clicked for this candidate
        let Some(detail) = ctx.resolve(&jobs.detail_panel, &detail_policy).await.found() else {
            log::debug!("no detail panel for candidate #{}", candidate.index);
            candidate.mark(CandidateStatus::NoApplyControl);
            return Ok(None);
        };

        if ctx
            .resolver()
            .is_present(Some(&detail), &jobs.already_applied)
            .await
        {
            candidate.mark(CandidateStatus::AlreadyApplied);
            return Ok(None);
        }

        let control_policy = ctx.short_policy(timeouts.control_ms);
        let apply = match ctx
            .resolve_in(Some(&detail), &jobs.apply, &control_policy)
            .await
            .found()
        {
            Some(apply) if self.is_apply_control(&apply).await => apply,
            _ => {
                candidate.mark(CandidateStatus::NoApplyControl);
                return Ok(None);
            }
        };

        candidate.mark(CandidateStatus::Applying);
        ctx.executor()
            .invoke(&apply, &Action::Click, &policy)
            .await
            .into_result(jobs.apply.name())?;

        let completion = ModalMachine::new(ctx).run().await?;
        if completion.counts_as_applied() {
            candidate.mark(CandidateStatus::Applied);
            ctx.emitter
                .success(format!("Applied to {}", candidate.label()));
            Ok(Some(ApplicationRecord::from_candidate(
                candidate,
                chrono::Local::now(),
            )))
        } else {
            log::warn!("{:?} for candidate #{}", completion, candidate.index);
            candidate.mark(CandidateStatus::Failed {
                reason: "submission unconfirmed".to_string(),
            });
            Ok(None)
        }
    }

    /// Text or aria-label mentions one of the apply keywords
    async fn is_apply_control(&self, apply: &ResolvedTarget) -> bool {
        let handle = apply.handle();
        let driver = self.ctx.driver;
        let mut label = driver
            .text_content(&handle)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        if let Ok(Some(aria)) = driver.attribute(&handle, "aria-label").await {
            label.push(' ');
            label.push_str(&aria);
        }

        let label = label.to_lowercase();
        let matched = self
            .ctx
            .profile
            .jobs
            .apply_keywords
            .iter()
            .any(|keyword| label.contains(&keyword.to_lowercase()));
        if !matched {
            log::debug!("apply control text '{}' has no apply keyword", label.trim());
        }
        matched
    }

    async fn extract(&self, index: usize, card: &ResolvedTarget) -> JobCandidate {
        let jobs = &self.ctx.profile.jobs;
        let mut candidate = JobCandidate::new(index);
        candidate.title = self.field_text(card, &jobs.title).await;
        candidate.company = self.field_text(card, &jobs.company).await;
        candidate.location = self.field_text(card, &jobs.location).await;
        candidate.application_link = self.link(card).await;
        candidate
    }

    /// First non-empty text among the chain's specs inside the card
    async fn field_text(&self, card: &ResolvedTarget, chain: &LocatorChain) -> String {
        for spec in chain.specs() {
            let selector = format!("{} >> nth=0", card.scoped(&spec.to_selector()));
            match self.ctx.driver.text_content(&selector).await {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    return text.split_whitespace().collect::<Vec<_>>().join(" ");
                }
                Ok(_) => {}
                Err(e) => log::debug!("'{}' unreadable on {}: {:#}", chain.name(), selector, e),
            }
        }
        String::new()
    }

    /// Absolute job link, empty when the card has none
    async fn link(&self, card: &ResolvedTarget) -> String {
        let chain = &self.ctx.profile.jobs.link;
        let mut href = None;
        for spec in chain.specs() {
            let selector = format!("{} >> nth=0", card.scoped(&spec.to_selector()));
            if let Ok(Some(value)) = self.ctx.driver.attribute(&selector, "href").await {
                if !value.trim().is_empty() {
                    href = Some(value.trim().to_string());
                    break;
                }
            }
        }
        let Some(href) = href else {
            return String::new();
        };

        let base = self.ctx.driver.current_url().await.unwrap_or_default();
        match url::Url::parse(&base).and_then(|base| base.join(&href)) {
            Ok(url) => url.to_string(),
            Err(_) => href,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeEffect, FakeElement};
    use crate::engine::LocatorSpec;
    use crate::flow::testkit::Harness;

    const BADGE: &str = "css=.details >> nth=0 >> css=.applied-badge";
    const APPLY: &str = "css=.details >> nth=0 >> css=.apply";

    fn add_card(h: &Harness, index: usize, effects: Vec<FakeEffect>) {
        let mut card = FakeElement::visible();
        for effect in effects {
            card = card.on_click(effect);
        }
        h.driver.add("css=.card", card);

        let scoped = |inner: &str| format!("css=.card >> nth={} >> {}", index, inner);
        h.driver.add(
            &scoped("css=.title"),
            FakeElement::visible().text(&format!("  Product   Manager {} ", index)),
        );
        h.driver.add(
            &scoped("css=.company"),
            FakeElement::visible().text(&format!("Company {}", index)),
        );
        h.driver
            .add(&scoped("css=.location"), FakeElement::visible().text("Bengaluru"));
        h.driver.add(
            &scoped("css=a.link"),
            FakeElement::visible().attr("href", &format!("/jobs/view/{}/", index)),
        );
    }

    fn already_applied() -> Vec<FakeEffect> {
        vec![
            FakeEffect::Remove(APPLY.into()),
            FakeEffect::Remove(BADGE.into()),
            FakeEffect::Add(BADGE.into(), FakeElement::visible()),
        ]
    }

    fn no_apply_control() -> Vec<FakeEffect> {
        vec![FakeEffect::Remove(APPLY.into()), FakeEffect::Remove(BADGE.into())]
    }

    fn easy_apply() -> Vec<FakeEffect> {
        let submit = FakeElement::visible()
            .on_click(FakeEffect::Add("css=.sent".into(), FakeElement::visible()));
        let apply = FakeElement::visible()
            .text("Easy Apply")
            .on_click(FakeEffect::Add("css=.modal".into(), FakeElement::visible()))
            .on_click(FakeEffect::Add(
                "css=.modal >> nth=0 >> css=.submit".into(),
                submit,
            ));
        vec![
            FakeEffect::Remove(APPLY.into()),
            FakeEffect::Remove(BADGE.into()),
            FakeEffect::Add(APPLY.into(), apply),
        ]
    }

    fn results_page(h: &Harness) {
        h.driver.set_url("https://jobs.test/jobs/search/?keywords=pm");
        h.driver.add("css=.details", FakeElement::visible());
    }

    #[tokio::test]
    async fn test_skips_to_first_applicable_candidate() {
        let h = Harness::new();
        results_page(&h);
        add_card(&h, 0, already_applied());
        add_card(&h, 1, already_applied());
        add_card(&h, 2, already_applied());
        add_card(&h, 3, no_apply_control());
        add_card(&h, 4, easy_apply());
        add_card(&h, 5, easy_apply());

        let ctx = h.ctx();
        let outcome = DiscoveryLoop::new(&ctx).run().await.unwrap();

        let statuses: Vec<_> = outcome.visited().iter().map(|c| c.status.clone()).collect();
        assert_eq!(
            statuses,
            vec![
                CandidateStatus::AlreadyApplied,
                CandidateStatus::AlreadyApplied,
                CandidateStatus::AlreadyApplied,
                CandidateStatus::NoApplyControl,
                CandidateStatus::Applied,
            ]
        );

        let record = outcome.record().unwrap();
        assert_eq!(record.title, "Product Manager 4");
        assert_eq!(record.company, "Company 4");
        assert_eq!(record.location, "Bengaluru");
        assert_eq!(record.link, "https://jobs.test/jobs/view/4/");

        assert_eq!(h.driver.click_count("css=.card >> nth=5"), 0);
    }

    #[tokio::test]
    async fn test_already_applied_candidates_are_not_reclicked() {
        let h = Harness::new();
        results_page(&h);
        add_card(&h, 0, already_applied());
        add_card(&h, 1, no_apply_control());

        let ctx = h.ctx();
        let outcome = DiscoveryLoop::new(&ctx).run().await.unwrap();

        assert!(outcome.record().is_none());
        assert_eq!(h.driver.click_count("css=.card >> nth=0"), 1);
        assert_eq!(h.driver.clicks_with_prefix(APPLY), 0);
    }

    #[tokio::test]
    async fn test_visits_at_most_max_candidates() {
        let mut h = Harness::new();
        h.config.limits.max_candidates = 2;
        results_page(&h);
        for index in 0..4 {
            add_card(&h, index, no_apply_control());
        }

        let ctx = h.ctx();
        let outcome = DiscoveryLoop::new(&ctx).run().await.unwrap();

        assert_eq!(outcome.visited().len(), 2);
        assert_eq!(h.driver.clicks_with_prefix("css=.card"), 2);
    }

    #[tokio::test]
    async fn test_apply_control_without_keyword_is_skipped() {
        let h = Harness::new();
        results_page(&h);
        add_card(
            &h,
            0,
            vec![FakeEffect::Add(
                APPLY.into(),
                FakeElement::visible().text("Apply on company website"),
            )],
        );

        let ctx = h.ctx();
        let outcome = DiscoveryLoop::new(&ctx).run().await.unwrap();

        assert_eq!(outcome.visited()[0].status, CandidateStatus::NoApplyControl);
        assert_eq!(h.driver.clicks_with_prefix(APPLY), 0);
    }

    #[tokio::test]
    async fn test_unconfirmed_submission_fails_candidate() {
        let h = Harness::new();
        results_page(&h);
        // modal opens but offers no control, and no success message shows
        add_card(
            &h,
            0,
            vec![FakeEffect::Add(
                APPLY.into(),
                FakeElement::visible()
                    .text("Easy Apply")
                    .on_click(FakeEffect::Add("css=.modal".into(), FakeElement::visible())),
            )],
        );

        let ctx = h.ctx();
        let outcome = DiscoveryLoop::new(&ctx).run().await.unwrap();

        assert!(matches!(
            outcome,
            DiscoveryOutcome::NoJobFound { ref visited }
                if matches!(visited[0].status, CandidateStatus::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_cards_is_no_job_found() {
        let h = Harness::new();
        results_page(&h);

        let ctx = h.ctx();
        let outcome = DiscoveryLoop::new(&ctx).run().await.unwrap();
        assert_eq!(outcome, DiscoveryOutcome::NoJobFound { visited: vec![] });
    }

    #[tokio::test]
    async fn test_apply_never_resolved_outside_detail_panel() {
        let h = Harness::new();
        h.driver.set_url("https://jobs.test/jobs/search/?keywords=pm");
        // the Easy Apply filter pill sits in the page header
        h.driver
            .add("css=.apply", FakeElement::visible().text("Easy Apply"));
        add_card(&h, 0, vec![]);

        let ctx = h.ctx();
        let outcome = DiscoveryLoop::new(&ctx).run().await.unwrap();

        assert_eq!(outcome.visited()[0].status, CandidateStatus::NoApplyControl);
        assert!(outcome.record().is_none());
        assert_eq!(h.driver.click_count("css=.apply >> nth=0"), 0);
    }

    #[tokio::test]
    async fn test_detail_panel_found_through_later_locator() {
        let mut h = Harness::new();
        h.profile.jobs.detail_panel = LocatorChain::new(
            "details",
            vec![LocatorSpec::css(".details-v1"), LocatorSpec::css(".details")],
        )
        .unwrap();
        results_page(&h);
        add_card(&h, 0, easy_apply());

        let ctx = h.ctx();
        let outcome = DiscoveryLoop::new(&ctx).run().await.unwrap();

        assert_eq!(outcome.visited()[0].status, CandidateStatus::Applied);
        assert_eq!(h.driver.click_count(&format!("{} >> nth=0", APPLY)), 1);
    }
}
