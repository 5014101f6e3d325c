//! Outreach drafts
//!
//! Renders a message for a qualifying creator from a template and a fixed
//! set of substitution variables. Rendering is deterministic: the same
//! profile, score, campaign and timestamp always produce the same draft.
//! A draft is never sent from here; any send, comment or export must be
//! submitted to the safety gate as a separate step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::{CreatorProfile, ScoreDecision, ScoreResult};

/// Default outreach template
pub const DEFAULT_TEMPLATE: &str = "Hey @{handle}!\n\n\
{opener}\n\n\
I'm with {brand} and we're putting together {campaign}. \
Would you be open to a gifted collab, with an optional affiliate code if it feels aligned?\n\n\
If yes, I can send quick details and let you choose what you'd love to try.\n\n\
{sign_off}";

const GENERIC_OPENER: &str = "I love your content and the way you show up for your community.";

/// Errors from draft generation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftError {
    #[error("Creator {creator_id} does not qualify for outreach ({decision:?})")]
    NotQualified {
        creator_id: String,
        decision: ScoreDecision,
    },

    #[error("Score belongs to {score_for}, not {creator_id}")]
    Mismatch { creator_id: String, score_for: String },

    #[error("Unknown template variable: {{{0}}}")]
    UnknownVariable(String),

    #[error("Malformed template: {0}")]
    Template(String),
}

/// Campaign settings supplied by the campaign-configuration collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignContext {
    pub name: String,
    pub brand: String,
    #[serde(default = "default_sign_off")]
    pub sign_off: String,
    /// Overrides [`DEFAULT_TEMPLATE`]
    #[serde(default)]
    pub template: Option<String>,
}

fn default_sign_off() -> String {
    "Talk soon!".to_string()
}

impl CampaignContext {
    pub fn new(name: &str, brand: &str) -> Self {
        Self {
            name: name.to_string(),
            brand: brand.to_string(),
            sign_off: default_sign_off(),
            template: None,
        }
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template = Some(template.to_string());
        self
    }

    pub fn with_sign_off(mut self, sign_off: &str) -> Self {
        self.sign_off = sign_off.to_string();
        self
    }
}

/// A rendered, unsent outreach message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachDraft {
    /// Content fingerprint; used as the payload reference of action requests
    pub draft_id: String,
    pub creator_id: String,
    pub campaign_context: CampaignContext,
    pub rendered_text: String,
    pub created_at: DateTime<Utc>,
}

/// Render a draft for an accepted creator
pub fn generate_draft(
    profile: &CreatorProfile,
    score: &ScoreResult,
    campaign: &CampaignContext,
    created_at: DateTime<Utc>,
) -> Result<OutreachDraft, DraftError> {
    if score.creator_id != profile.handle {
        return Err(DraftError::Mismatch {
            creator_id: profile.handle.clone(),
            score_for: score.creator_id.clone(),
        });
    }
    if score.decision != ScoreDecision::Accept {
        return Err(DraftError::NotQualified {
            creator_id: profile.handle.clone(),
            decision: score.decision,
        });
    }

    let variables = variables(profile, score, campaign);
    let template = campaign.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
    let rendered_text = render(template, &variables)?;

    Ok(OutreachDraft {
        draft_id: fingerprint(&profile.handle, &campaign.name, &rendered_text),
        creator_id: profile.handle.clone(),
        campaign_context: campaign.clone(),
        rendered_text,
        created_at,
    })
}

fn variables(
    profile: &CreatorProfile,
    score: &ScoreResult,
    campaign: &CampaignContext,
) -> BTreeMap<&'static str, String> {
    let top_niche = score.matched_niches.first().cloned();
    let top_tag = profile.content_tags().into_iter().next();

    let opener = match (&top_niche, &top_tag) {
        (Some(niche), _) => format!("I love how you share about {}.", niche),
        (None, Some(tag)) => format!("I really enjoy your #{} content.", tag),
        (None, None) => GENERIC_OPENER.to_string(),
    };

    BTreeMap::from([
        ("handle", profile.handle.clone()),
        ("opener", opener),
        ("campaign", campaign.name.clone()),
        ("brand", campaign.brand.clone()),
        ("top_niche", top_niche.unwrap_or_default()),
        ("sign_off", campaign.sign_off.clone()),
    ])
}

/// Substitute `{name}` placeholders; `{{` and `}}` are literal braces
pub fn render(template: &str, variables: &BTreeMap<&str, String>) -> Result<String, DraftError> {
    let mut out = String::with_capacity(template.len() + 64);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(DraftError::Template(format!(
                                "unclosed placeholder '{{{}'",
                                name
                            )))
                        }
                        Some(ch) => name.push(ch),
                    }
                }
                let value = variables
                    .get(name.trim())
                    .ok_or_else(|| DraftError::UnknownVariable(name.trim().to_string()))?;
                out.push_str(value);
            }
            '}' => return Err(DraftError::Template("unmatched '}'".to_string())),
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn fingerprint(creator_id: &str, campaign: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(creator_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(campaign.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{evaluate_fraud, score_creator, ScoutConfig};

    fn accepted() -> (CreatorProfile, ScoreResult) {
        let config = ScoutConfig::default();
        let profile = CreatorProfile::new("glowwithana")
            .with_followers(24_000)
            .with_following(700)
            .with_posts(300)
            .with_engagement(0.05)
            .with_bio("Natural skincare and shea rituals")
            .with_post("Sunday reset #selfcare");
        let fraud = evaluate_fraud(&profile, &config.fraud);
        let score = score_creator(&profile, &fraud, &config.scoring, config.fraud.max_followers);
        (profile, score)
    }

    #[test]
    fn test_draft_renders_default_template() {
        let (profile, score) = accepted();
        assert_eq!(score.decision, ScoreDecision::Accept);

        let campaign = CampaignContext::new("our spring shea drop", "Hello Natural");
        let draft = generate_draft(&profile, &score, &campaign, Utc::now()).unwrap();

        assert!(draft.rendered_text.starts_with("Hey @glowwithana!"));
        assert!(draft
            .rendered_text
            .contains("I love how you share about natural skincare."));
        assert!(draft.rendered_text.contains("I'm with Hello Natural"));
        assert!(draft.rendered_text.ends_with("Talk soon!"));
        assert_eq!(draft.draft_id.len(), 16);
    }

    #[test]
    fn test_draft_is_deterministic() {
        let (profile, score) = accepted();
        let campaign = CampaignContext::new("spring", "Hello Natural");
        let at = Utc::now();
        let a = generate_draft(&profile, &score, &campaign, at).unwrap();
        let b = generate_draft(&profile, &score, &campaign, at).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_non_accepted() {
        let (profile, mut score) = accepted();
        score.decision = ScoreDecision::Archive;
        let err = generate_draft(&profile, &score, &CampaignContext::new("x", "y"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DraftError::NotQualified { .. }));
    }

    #[test]
    fn test_rejects_mismatched_score() {
        let (_, score) = accepted();
        let other = CreatorProfile::new("someone_else");
        let err = generate_draft(&other, &score, &CampaignContext::new("x", "y"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DraftError::Mismatch { .. }));
    }

    #[test]
    fn test_custom_template_and_errors() {
        let (profile, score) = accepted();
        let campaign = CampaignContext::new("spring", "Hello Natural")
            .with_template("Hi {handle} {{literal}} from {brand}");
        let draft = generate_draft(&profile, &score, &campaign, Utc::now()).unwrap();
        assert_eq!(draft.rendered_text, "Hi glowwithana {literal} from Hello Natural");

        let unknown = CampaignContext::new("spring", "b").with_template("Hi {nickname}");
        assert_eq!(
            generate_draft(&profile, &score, &unknown, Utc::now()).unwrap_err(),
            DraftError::UnknownVariable("nickname".to_string())
        );

        let unclosed = CampaignContext::new("spring", "b").with_template("Hi {handle");
        assert!(matches!(
            generate_draft(&profile, &score, &unclosed, Utc::now()).unwrap_err(),
            DraftError::Template(_)
        ));
    }

    #[test]
    fn test_opener_falls_back_to_tag_then_generic() {
        let profile = CreatorProfile::new("ana").with_post("#gardening");
        let score = ScoreResult {
            creator_id: "ana".to_string(),
            score: 70,
            breakdown: crate::ScoreBreakdown {
                audience_fit: 1.0,
                niche_alignment: 0.5,
                engagement: 0.5,
                authenticity: 1.0,
            },
            decision: ScoreDecision::Accept,
            fraud_flags: Default::default(),
            matched_niches: Vec::new(),
        };
        let campaign = CampaignContext::new("c", "b").with_template("{opener}");

        let draft = generate_draft(&profile, &score, &campaign, Utc::now()).unwrap();
        assert_eq!(draft.rendered_text, "I really enjoy your #gardening content.");

        let bare = CreatorProfile::new("ana");
        let draft = generate_draft(&bare, &score, &campaign, Utc::now()).unwrap();
        assert_eq!(draft.rendered_text, GENERIC_OPENER);
    }
}
