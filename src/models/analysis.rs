use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::dto::{AnalysisDetail, AnalysisListItem, AnalyzedPeriod, EmotionDetail, Recommendation};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "analysis_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Daily,
    Weekly,
    Monthly,
}

impl AnalysisType {
    /// The inclusive period a job of this type covers, ending at `today`.
    pub fn period_ending(&self, today: NaiveDate) -> AnalyzedPeriod {
        let start = match self {
            AnalysisType::Daily => today,
            AnalysisType::Weekly => today - Duration::days(6),
            AnalysisType::Monthly => today - Duration::days(29),
        };
        AnalyzedPeriod {
            start_date: start,
            end_date: today,
        }
    }
}

impl FromStr for AnalysisType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "analysis_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Processing,
    Completed,
    Failed,
}

impl FromStr for AnalysisStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

/// One analysis job. `emotion_analysis` / `recommendations` are JSONB
/// documents written by the engine when the job completes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Analysis {
    pub id: i64,
    pub user_id: i64,
    pub analysis_type: AnalysisType,
    pub status: AnalysisStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub diary_count: i32,
    pub emotion_analysis: Option<serde_json::Value>,
    pub recommendations: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Analysis {
    pub fn period(&self) -> AnalyzedPeriod {
        AnalyzedPeriod {
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    fn emotion_detail(&self) -> Option<EmotionDetail> {
        self.emotion_analysis
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn recommendation_list(&self) -> Option<Vec<Recommendation>> {
        self.recommendations
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl From<Analysis> for AnalysisDetail {
    fn from(a: Analysis) -> Self {
        Self {
            emotion_analysis: a.emotion_detail(),
            recommendations: a.recommendation_list(),
            analysis_id: a.id,
            analysis_type: a.analysis_type,
            status: a.status,
            analyzed_period: a.period(),
            diary_count: a.diary_count,
            created_at: a.created_at,
            completed_at: a.completed_at,
        }
    }
}

impl From<Analysis> for AnalysisListItem {
    fn from(a: Analysis) -> Self {
        Self {
            emotion_analysis: a.emotion_detail().as_ref().map(Into::into),
            analysis_id: a.id,
            analysis_type: a.analysis_type,
            status: a.status,
            analyzed_period: a.period(),
            diary_count: a.diary_count,
            created_at: a.created_at,
            completed_at: a.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekly_period_spans_exactly_seven_days() {
        let period = AnalysisType::Weekly.period_ending(d(2025, 1, 7));
        assert_eq!(period.start_date, d(2025, 1, 1));
        assert_eq!(period.end_date, d(2025, 1, 7));
        assert_eq!((period.end_date - period.start_date).num_days() + 1, 7);
    }

    #[test]
    fn daily_period_is_a_single_day() {
        let period = AnalysisType::Daily.period_ending(d(2025, 1, 6));
        assert_eq!(period.start_date, period.end_date);
    }

    #[test]
    fn monthly_period_spans_thirty_days() {
        let period = AnalysisType::Monthly.period_ending(d(2025, 3, 15));
        assert_eq!((period.end_date - period.start_date).num_days() + 1, 30);
    }

    #[test]
    fn analysis_type_parses_known_values_only() {
        assert_eq!(AnalysisType::from_str("weekly"), Ok(AnalysisType::Weekly));
        assert_eq!(AnalysisType::from_str("daily"), Ok(AnalysisType::Daily));
        assert_eq!(AnalysisType::from_str("monthly"), Ok(AnalysisType::Monthly));
        assert!(AnalysisType::from_str("yearly").is_err());
        assert!(AnalysisType::from_str("Weekly").is_err());
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!(
            AnalysisStatus::from_str("processing"),
            Ok(AnalysisStatus::Processing)
        );
        assert!(AnalysisStatus::from_str("done").is_err());
    }
}
