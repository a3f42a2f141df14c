use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::core::config::Settings;
use crate::services::actions::{self, ActionEnvelope};

#[derive(Debug, Clone)]
pub(crate) struct ReviewRequest {
    pub(crate) submission_id: String,
    pub(crate) challenge_title: String,
    pub(crate) challenge_description: String,
    pub(crate) criteria_design: String,
    pub(crate) criteria_functionality: String,
    pub(crate) criteria_completion: String,
    pub(crate) reference_log: ActionEnvelope,
    pub(crate) student_log: ActionEnvelope,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReviewScores {
    pub(crate) score_design: i32,
    pub(crate) score_functionality: i32,
    pub(crate) score_completion: i32,
    pub(crate) comment: String,
}

const DEFAULT_COMMENT: &str = "Évaluation automatique par IA.";

#[derive(Debug, Clone)]
pub(crate) struct AiReviewService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AiReviewService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
            max_tokens: settings.ai().ai_max_tokens,
        })
    }

    pub(crate) async fn review_submission(&self, request: &ReviewRequest) -> Result<ReviewScores> {
        let timer = Instant::now();
        let prompt = build_prompt(request);

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": 0,
        });

        tracing::info!(
            submission_id = %request.submission_id,
            prompt_chars = prompt.len(),
            "Sending AI review request"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=3 {
            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow::anyhow!("AI API error: {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call AI API"));
                }
            }

            if attempt < 3 {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt as u32))).await;
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .context("Missing AI response content")?;

        let scores = parse_review_response(content)?;

        tracing::info!(
            submission_id = %request.submission_id,
            duration_seconds = timer.elapsed().as_secs_f64(),
            score_design = scores.score_design,
            score_functionality = scores.score_functionality,
            score_completion = scores.score_completion,
            "AI review completed"
        );

        Ok(scores)
    }
}

/// Builds the review prompt. Only summarized actions go in; the same inputs
/// always produce the same prompt text, which keeps the call replayable when
/// a job is retried.
pub(crate) fn build_prompt(request: &ReviewRequest) -> String {
    let reference_summary = actions::summarize(&request.reference_log.actions);
    let student_summary = actions::summarize(&request.student_log.actions);

    let reference_json =
        serde_json::to_string_pretty(&reference_summary).unwrap_or_else(|_| "[]".to_string());
    let student_json =
        serde_json::to_string_pretty(&student_summary).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"Tu es un correcteur expert pour une plateforme d'apprentissage Bubble.io. Tu dois évaluer la soumission d'un élève en comparant ses actions avec la solution de référence.

## DÉFI
**Titre:** {title}
**Description:** {description}

## CRITÈRES D'ÉVALUATION
- **Design (0-5):** {criteria_design}
- **Fonctionnalités (0-5):** {criteria_functionality}
- **Réalisation (0-5):** {criteria_completion}

## STATISTIQUES
| | Référence | Élève |
|---|---|---|
| Actions | {reference_count} | {student_count} |
| Captures | {reference_screenshots} | {student_screenshots} |

## ACTIONS DE RÉFÉRENCE (ce que l'élève doit faire)
```json
{reference_json}
```

## ACTIONS DE L'ÉLÈVE (ce qu'il a fait)
```json
{student_json}
```

## GUIDE D'ANALYSE
Chaque action contient:
- **type**: click, input, drag, navigate, keypress, scroll
- **what/text**: le texte visible de l'élément cliqué (ex: "Enregistrer", "Design", "Ajouter")
- **where/context**: la section/panneau où se trouve l'élément (ex: "Properties > Appearance")
- **field/label**: pour les inputs, le nom du champ
- **value**: la valeur saisie

## POINTS À ÉVALUER
1. **Correspondance des actions clés**: L'élève a-t-il cliqué sur les mêmes éléments que la référence (boutons, onglets, options)?
2. **Séquence logique**: Les actions sont-elles dans un ordre cohérent?
3. **Valeurs saisies**: Les inputs sont-ils corrects (couleurs, textes, dimensions)?
4. **Actions manquantes**: Y a-t-il des étapes essentielles non réalisées?
5. **Actions superflues**: L'élève a-t-il fait beaucoup d'essais-erreurs?

## BARÈME
- 5/5: Parfait, toutes les étapes sont correctes
- 4/5: Très bien, quelques petites différences mineures
- 3/5: Bien, l'essentiel est fait mais il manque des détails
- 2/5: Partiel, plusieurs étapes manquantes ou incorrectes
- 1/5: Insuffisant, peu d'étapes correctes
- 0/5: Non réalisé ou complètement hors sujet

## RÉPONSE ATTENDUE
Réponds UNIQUEMENT avec un JSON valide (sans markdown, sans texte avant/après):
{{"score_design": X, "score_functionality": X, "score_completion": X, "comment": "Commentaire constructif en français (2-3 phrases). Mentionne ce qui a été bien fait ET ce qui peut être amélioré."}}"#,
        title = request.challenge_title,
        description = request.challenge_description,
        criteria_design = request.criteria_design,
        criteria_functionality = request.criteria_functionality,
        criteria_completion = request.criteria_completion,
        reference_count = request.reference_log.actions.len(),
        student_count = request.student_log.actions.len(),
        reference_screenshots = request.reference_log.screenshots.len(),
        student_screenshots = request.student_log.screenshots.len(),
    )
}

/// Models routinely wrap the JSON in markdown fences or surrounding prose
/// despite the instructions, so the parser digs the object out first.
pub(crate) fn parse_review_response(content: &str) -> Result<ReviewScores> {
    let extracted = extract_json(content);
    let parsed: Value =
        serde_json::from_str(extracted).context("Failed to parse AI review JSON")?;

    let comment = parsed
        .get("comment")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(DEFAULT_COMMENT)
        .to_string();

    Ok(ReviewScores {
        score_design: clamp_score(score_field(&parsed, "score_design")?),
        score_functionality: clamp_score(score_field(&parsed, "score_functionality")?),
        score_completion: clamp_score(score_field(&parsed, "score_completion")?),
        comment,
    })
}

fn score_field(parsed: &Value, field: &str) -> Result<f64> {
    parsed
        .get(field)
        .and_then(Value::as_f64)
        .with_context(|| format!("AI review JSON missing {field}"))
}

pub(crate) fn clamp_score(value: f64) -> i32 {
    (value.round() as i64).clamp(0, 5) as i32
}

fn extract_json(content: &str) -> &str {
    if let Some(fence_start) = content.find("```") {
        let after_fence = &content[fence_start + 3..];
        let after_tag = after_fence.strip_prefix("json").unwrap_or(after_fence);
        if let Some(fence_end) = after_tag.find("```") {
            return after_tag[..fence_end].trim();
        }
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            return content[start..=end].trim();
        }
    }

    content.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_with_actions(reference: Vec<Value>, student: Vec<Value>) -> ReviewRequest {
        ReviewRequest {
            submission_id: "sub-1".to_string(),
            challenge_title: "Bouton rouge".to_string(),
            challenge_description: "Créer un bouton rouge".to_string(),
            criteria_design: "Couleurs correctes".to_string(),
            criteria_functionality: "Le bouton fonctionne".to_string(),
            criteria_completion: "Toutes les étapes".to_string(),
            reference_log: ActionEnvelope {
                actions: reference,
                screenshots: vec![json!({"t": 0})],
                metadata: json!({}),
            },
            student_log: ActionEnvelope {
                actions: student,
                screenshots: Vec::new(),
                metadata: json!({}),
            },
        }
    }

    #[test]
    fn prompt_is_deterministic() {
        let actions = vec![json!({"type": "click", "t": 1000, "text": "Design"})];
        let request = request_with_actions(actions.clone(), actions);
        assert_eq!(build_prompt(&request), build_prompt(&request));
    }

    #[test]
    fn prompt_contains_counts_and_criteria() {
        let request = request_with_actions(
            vec![json!({"type": "click", "t": 0}), json!({"type": "scroll", "t": 100})],
            vec![json!({"type": "click", "t": 0})],
        );
        let prompt = build_prompt(&request);
        assert!(prompt.contains("Bouton rouge"));
        assert!(prompt.contains("| Actions | 2 | 1 |"));
        assert!(prompt.contains("| Captures | 1 | 0 |"));
    }

    #[test]
    fn parses_bare_json() {
        let content = r#"{"score_design": 4, "score_functionality": 3, "score_completion": 5, "comment": "Bien joué."}"#;
        let scores = parse_review_response(content).expect("scores");
        assert_eq!(scores.score_design, 4);
        assert_eq!(scores.comment, "Bien joué.");
    }

    #[test]
    fn parses_fenced_json() {
        let content = "Voici mon évaluation:\n```json\n{\"score_design\": 2, \"score_functionality\": 2, \"score_completion\": 1, \"comment\": \"Partiel.\"}\n```\nBonne chance!";
        let scores = parse_review_response(content).expect("scores");
        assert_eq!(scores.score_design, 2);
        assert_eq!(scores.score_completion, 1);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let content = "Résultat: {\"score_design\": 5, \"score_functionality\": 4, \"score_completion\": 4, \"comment\": \"Très bien.\"} Merci.";
        let scores = parse_review_response(content).expect("scores");
        assert_eq!(scores.score_design, 5);
    }

    #[test]
    fn clamps_out_of_range_scores() {
        let content = r#"{"score_design": 7, "score_functionality": -2, "score_completion": 3.6, "comment": "ok"}"#;
        let scores = parse_review_response(content).expect("scores");
        assert_eq!(scores.score_design, 5);
        assert_eq!(scores.score_functionality, 0);
        assert_eq!(scores.score_completion, 4);
    }

    #[test]
    fn empty_comment_gets_default() {
        let content = r#"{"score_design": 3, "score_functionality": 3, "score_completion": 3, "comment": "  "}"#;
        let scores = parse_review_response(content).expect("scores");
        assert_eq!(scores.comment, DEFAULT_COMMENT);
    }

    #[test]
    fn missing_score_is_an_error() {
        let content = r#"{"score_design": 3, "comment": "incomplet"}"#;
        assert!(parse_review_response(content).is_err());
    }
}
