//! Asynchronous emotion-analysis engine.
//!
//! Jobs are created in `processing` by the analysis handler; a background
//! worker owns the transition to `completed` or `failed`. The assessment
//! comes from the AI model over HTTP, with a deterministic fallback when
//! the model is unreachable, so jobs always terminate.

use serde::Deserialize;
use std::collections::HashMap;

use crate::dto::{EmotionDetail, Priority, Recommendation, RecommendationType, RiskLevel};
use crate::error::AppResult;
use crate::models::analysis::{Analysis, AnalysisStatus};
use crate::models::diary::Diary;
use crate::AppState;

/// Model output: the full assessment plus activity suggestions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOutput {
    pub emotion_analysis: EmotionDetail,
    pub recommendations: Vec<Recommendation>,
}

/// Spawn the worker loop. Polls for queued jobs and drains them.
pub fn spawn_analysis_worker(state: AppState) {
    let poll = std::time::Duration::from_secs(state.config.analysis_poll_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll);
        loop {
            interval.tick().await;
            loop {
                match process_next_job(&state).await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Analysis worker iteration failed");
                        break;
                    }
                }
            }
        }
    });
}

/// Claim and finish the oldest queued job. Returns false when idle.
async fn process_next_job(state: &AppState) -> AppResult<bool> {
    let job = sqlx::query_as::<_, Analysis>(
        r#"
        SELECT * FROM analyses
        WHERE status = 'processing'
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .fetch_optional(&state.db)
    .await?;

    let Some(job) = job else {
        return Ok(false);
    };

    let outcome = match run_analysis(state, &job).await {
        Ok(output) => completed_payload(&output).map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };

    match outcome {
        Ok((emotion_analysis, recommendations)) => {
            // Status guard keeps the transition monotonic if the job was
            // re-processed concurrently.
            sqlx::query(
                r#"
                UPDATE analyses SET
                    status = 'completed',
                    emotion_analysis = $2,
                    recommendations = $3,
                    completed_at = NOW()
                WHERE id = $1 AND status = 'processing'
                "#,
            )
            .bind(job.id)
            .bind(emotion_analysis)
            .bind(recommendations)
            .execute(&state.db)
            .await?;

            tracing::info!(analysis_id = job.id, user_id = job.user_id, "Analysis completed");
        }
        Err(e) => {
            tracing::error!(analysis_id = job.id, error = %e, "Analysis failed");
            sqlx::query(
                "UPDATE analyses SET status = 'failed', completed_at = NOW() WHERE id = $1 AND status = 'processing'",
            )
            .bind(job.id)
            .execute(&state.db)
            .await?;
        }
    }

    Ok(true)
}

/// JSONB documents for a completed row. A row only reaches `completed`
/// with both documents present; a serialization failure fails the job.
fn completed_payload(
    output: &EngineOutput,
) -> Result<(serde_json::Value, serde_json::Value), serde_json::Error> {
    Ok((
        serde_json::to_value(&output.emotion_analysis)?,
        serde_json::to_value(&output.recommendations)?,
    ))
}

async fn run_analysis(state: &AppState, job: &Analysis) -> Result<EngineOutput, anyhow::Error> {
    debug_assert_eq!(job.status, AnalysisStatus::Processing);

    let diaries = sqlx::query_as::<_, Diary>(
        r#"
        SELECT * FROM diaries
        WHERE user_id = $1 AND diary_date BETWEEN $2 AND $3
        ORDER BY diary_date ASC
        "#,
    )
    .bind(job.user_id)
    .bind(job.start_date)
    .bind(job.end_date)
    .fetch_all(&state.db)
    .await?;

    // Try the model, fall back to the deterministic analyzer if unavailable
    let output = match call_model(state, &diaries).await {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(analysis_id = job.id, error = %e, "AI model unavailable, using deterministic fallback");
            fallback_analysis(&diaries)
        }
    };

    Ok(output)
}

async fn call_model(state: &AppState, diaries: &[Diary]) -> Result<EngineOutput, anyhow::Error> {
    if state.config.ai_api_key.is_empty() {
        anyhow::bail!("AI_API_KEY not configured");
    }

    let diary_lines: Vec<String> = diaries
        .iter()
        .map(|d| {
            let content: String = d.content.chars().take(500).collect();
            format!("- [{}] ({}) {}", d.diary_date, d.emotion_type, content)
        })
        .collect();

    let prompt = format!(
        r#"You are an emotion-analysis assistant for a diary app. Analyze these diary entries and assess the writer's emotional state.

Entries:
{}

Respond with JSON only, using this exact schema:
{{
  "emotionAnalysis": {{
    "overallMood": "one-word mood label",
    "moodScore": 5.5,
    "dominantEmotions": ["tag1", "tag2", "tag3"],
    "riskLevel": "low|medium|high",
    "summary": "2-3 sentence assessment"
  }},
  "recommendations": [
    {{"type": "walking|meditation|shower|nap", "title": "...", "description": "...", "duration": 15, "priority": "low|medium|high"}}
  ]
}}
moodScore ranges 1-10. Include 2-4 recommendations."#,
        diary_lines.join("\n")
    );

    // 30-second timeout to prevent indefinite hangs
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let response = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", &state.config.ai_api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&serde_json::json!({
            "model": state.config.ai_model,
            "max_tokens": 1024,
            "messages": [{
                "role": "user",
                "content": prompt
            }]
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Model API error {}: {}", status, body);
    }

    let model_response: serde_json::Value = response.json().await?;
    let text = model_response["content"][0]["text"].as_str().unwrap_or("{}");

    let output: EngineOutput = serde_json::from_str(text)?;
    Ok(output)
}

/// Per-emotion base score on the 1-10 mood scale.
fn emotion_score(emotion: &str) -> f64 {
    match emotion {
        "happy" => 8.5,
        "excited" => 8.0,
        "calm" => 7.0,
        "neutral" => 5.5,
        "anxious" => 4.0,
        "angry" => 3.5,
        "sad" => 3.0,
        "depressed" => 2.0,
        _ => 5.0,
    }
}

/// Deterministic assessment from emotion-tag frequencies. Used whenever
/// the model is unreachable so jobs never stall in `processing`.
pub fn fallback_analysis(diaries: &[Diary]) -> EngineOutput {
    let mood_score = if diaries.is_empty() {
        5.0
    } else {
        let sum: f64 = diaries.iter().map(|d| emotion_score(&d.emotion_type)).sum();
        let avg = sum / diaries.len() as f64;
        (avg * 10.0).round() / 10.0
    }
    .clamp(1.0, 10.0);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for d in diaries {
        *counts.entry(d.emotion_type.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let dominant_emotions: Vec<String> = ranked
        .into_iter()
        .take(3)
        .map(|(tag, _)| tag.to_string())
        .collect();

    let risk_level = if mood_score >= 6.0 {
        RiskLevel::Low
    } else if mood_score >= 4.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    let overall_mood = if mood_score >= 7.0 {
        "positive"
    } else if mood_score >= 5.0 {
        "stable"
    } else if mood_score >= 3.5 {
        "low"
    } else {
        "depressed"
    };

    let summary = format!(
        "Across {} diary entries the average mood score was {:.1}/10. {}",
        diaries.len(),
        mood_score,
        match risk_level {
            RiskLevel::Low => "Your emotional state looks stable for this period.",
            RiskLevel::Medium =>
                "Some heavier days showed up; small restorative breaks could help.",
            RiskLevel::High =>
                "A sustained low mood is visible; consider reaching out to someone you trust.",
        }
    );

    EngineOutput {
        emotion_analysis: EmotionDetail {
            overall_mood: overall_mood.into(),
            mood_score,
            dominant_emotions,
            risk_level,
            summary,
        },
        recommendations: recommendations_for(risk_level),
    }
}

fn recommendations_for(risk: RiskLevel) -> Vec<Recommendation> {
    let mut recs = vec![
        Recommendation {
            rec_type: RecommendationType::Walking,
            title: "Light walk".into(),
            description: "Walk slowly around your neighborhood for 10-15 minutes.".into(),
            duration: 15,
            priority: if risk == RiskLevel::Low {
                Priority::Medium
            } else {
                Priority::High
            },
        },
        Recommendation {
            rec_type: RecommendationType::Meditation,
            title: "Breathing meditation".into(),
            description: "Calm your mind with five minutes of deep breathing.".into(),
            duration: 5,
            priority: Priority::Medium,
        },
    ];

    if risk != RiskLevel::Low {
        recs.push(Recommendation {
            rec_type: RecommendationType::Shower,
            title: "Warm shower".into(),
            description: "Relax your body and mind with warm water.".into(),
            duration: 10,
            priority: Priority::Medium,
        });
        recs.push(Recommendation {
            rec_type: RecommendationType::Nap,
            title: "Short nap".into(),
            description: "Take a short rest of about 20 minutes.".into(),
            duration: 20,
            priority: Priority::Low,
        });
    }

    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn diary(emotion: &str, day: u32) -> Diary {
        let now = Utc::now();
        Diary {
            id: day as i64,
            user_id: 1,
            emotion_type: emotion.into(),
            content: "entry".into(),
            diary_date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fallback_scores_stay_in_range() {
        let happy: Vec<Diary> = (1..=7).map(|d| diary("happy", d)).collect();
        let out = fallback_analysis(&happy);
        assert!(out.emotion_analysis.mood_score >= 1.0);
        assert!(out.emotion_analysis.mood_score <= 10.0);
        assert_eq!(out.emotion_analysis.risk_level, RiskLevel::Low);
        assert!(!out.recommendations.is_empty());
    }

    #[test]
    fn sad_period_raises_risk() {
        let sad: Vec<Diary> = (1..=5).map(|d| diary("sad", d)).collect();
        let out = fallback_analysis(&sad);
        assert_eq!(out.emotion_analysis.risk_level, RiskLevel::High);
        // High risk always carries the full recommendation set
        assert!(out.recommendations.len() >= 3);
        assert!(out
            .recommendations
            .iter()
            .any(|r| r.rec_type == RecommendationType::Walking && r.priority == Priority::High));
    }

    #[test]
    fn dominant_emotions_ranked_by_frequency() {
        let mut diaries: Vec<Diary> = (1..=3).map(|d| diary("sad", d)).collect();
        diaries.push(diary("happy", 4));
        diaries.push(diary("calm", 5));
        diaries.push(diary("calm", 6));
        let out = fallback_analysis(&diaries);
        assert_eq!(out.emotion_analysis.dominant_emotions[0], "sad");
        assert_eq!(out.emotion_analysis.dominant_emotions[1], "calm");
        assert_eq!(out.emotion_analysis.dominant_emotions.len(), 3);
    }

    #[test]
    fn unknown_emotions_fall_back_to_neutral_score() {
        let diaries = vec![diary("confused", 1)];
        let out = fallback_analysis(&diaries);
        assert_eq!(out.emotion_analysis.mood_score, 5.0);
        assert_eq!(out.emotion_analysis.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn completed_payload_is_never_null() {
        let sad: Vec<Diary> = (1..=4).map(|d| diary("sad", d)).collect();
        let output = fallback_analysis(&sad);
        let (emotion, recs) = completed_payload(&output).unwrap();
        assert!(emotion.is_object());
        assert!(recs.is_array());
        assert_eq!(emotion["riskLevel"], "high");
    }

    #[test]
    fn empty_input_is_handled() {
        let out = fallback_analysis(&[]);
        assert_eq!(out.emotion_analysis.mood_score, 5.0);
        assert!(out.emotion_analysis.dominant_emotions.is_empty());
    }
}
