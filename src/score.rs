use crate::anomaly::AnomalyRecord;
use serde::{Deserialize, Serialize};

/// Anomalies older than this no longer weigh on the score.
pub const SCORE_WINDOW_SECS: i64 = 600;
pub const ANOMALY_PENALTY: i64 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Score {
    pub score: i64,
}

/// 100 minus a flat penalty per recent anomaly, floored at 0.
pub fn security_score(anomalies: &[AnomalyRecord], now: i64) -> Score {
    let recent = anomalies
        .iter()
        .filter(|a| a.ts > now - SCORE_WINDOW_SECS)
        .count() as i64;
    Score {
        score: (100 - recent * ANOMALY_PENALTY).max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anomaly(ts: i64) -> AnomalyRecord {
        AnomalyRecord::new(ts, "burst", "Traffic burst: 130 pkts/sec".to_string())
    }

    #[test]
    fn test_clean_network_scores_100() {
        assert_eq!(security_score(&[], 10_000).score, 100);
    }

    #[test]
    fn test_each_recent_anomaly_costs_ten() {
        let now = 10_000;
        let anomalies = vec![anomaly(now - 10), anomaly(now - 50), anomaly(now - 599)];
        assert_eq!(security_score(&anomalies, now).score, 70);
    }

    #[test]
    fn test_old_anomalies_do_not_count() {
        let now = 10_000;
        let anomalies = vec![anomaly(now - 600), anomaly(now - 10_000)];
        assert_eq!(security_score(&anomalies, now).score, 100);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let now = 10_000;
        let anomalies: Vec<AnomalyRecord> = (0..15).map(|i| anomaly(now - i)).collect();
        assert_eq!(security_score(&anomalies, now).score, 0);
    }

    #[test]
    fn test_score_serializes_as_object() {
        let json = serde_json::to_string(&Score { score: 87 }).expect("serializes");
        assert_eq!(json, r#"{"score":87}"#);
    }
}
