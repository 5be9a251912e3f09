use std::collections::HashMap;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    ChannelSummary, EngagementError, IngestMentionRequest, SentimentLabel, SocialChannel,
    SocialMention, SummaryQuery,
};
use crate::services::sentiment::SentimentAnalyzer;

pub struct SocialService {
    supabase: SupabaseClient,
    analyzer: SentimentAnalyzer,
}

impl SocialService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            analyzer: SentimentAnalyzer::new(),
        }
    }

    /// Store a mention with its sentiment scored at ingest time.
    pub async fn ingest_mention(
        &self,
        request: IngestMentionRequest,
        auth_token: &str,
    ) -> Result<SocialMention, EngagementError> {
        if request.content.trim().is_empty() {
            return Err(EngagementError::Validation("Content is required".to_string()));
        }

        let (score, label) = self.analyzer.analyze(&request.content);

        let mention_data = json!({
            "channel": request.channel,
            "author": request.author,
            "content": request.content,
            "posted_at": request.posted_at.to_rfc3339(),
            "sentiment_score": score,
            "sentiment_label": label,
            "created_at": Utc::now().to_rfc3339()
        });

        let mention: SocialMention = self
            .supabase
            .insert_returning("/rest/v1/social_mentions", Some(auth_token), mention_data)
            .await
            .map_err(|e| EngagementError::Database(e.to_string()))?;

        info!(
            "Mention {} ingested from {} ({:?}, {:.2})",
            mention.id, mention.channel, mention.sentiment_label, mention.sentiment_score
        );
        Ok(mention)
    }

    pub async fn list_mentions(
        &self,
        channel: Option<SocialChannel>,
        query: &SummaryQuery,
        auth_token: &str,
    ) -> Result<Vec<SocialMention>, EngagementError> {
        let mut path = String::from("/rest/v1/social_mentions?select=*&order=posted_at.desc&limit=200");
        if let Some(channel) = channel {
            path.push_str(&format!("&channel=eq.{}", channel));
        }
        if let Some(from) = query.from_date {
            path.push_str(&format!("&posted_at=gte.{}", from.to_rfc3339()));
        }
        if let Some(to) = query.to_date {
            path.push_str(&format!("&posted_at=lte.{}", to.to_rfc3339()));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| EngagementError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| EngagementError::Database(e.to_string()))
            })
            .collect()
    }

    /// Per-channel label counts and mean score over the queried window.
    pub async fn channel_summary(
        &self,
        query: &SummaryQuery,
        auth_token: &str,
    ) -> Result<Vec<ChannelSummary>, EngagementError> {
        let mentions = self.list_mentions(None, query, auth_token).await?;

        let mut grouped: HashMap<SocialChannel, Vec<&SocialMention>> = HashMap::new();
        for mention in &mentions {
            grouped.entry(mention.channel).or_default().push(mention);
        }

        let mut summaries: Vec<ChannelSummary> = grouped
            .into_iter()
            .map(|(channel, mentions)| summarize_channel(channel, &mentions))
            .collect();
        summaries.sort_by(|a, b| b.total.cmp(&a.total));

        debug!("Built summaries for {} channel(s)", summaries.len());
        Ok(summaries)
    }
}

fn summarize_channel(channel: SocialChannel, mentions: &[&SocialMention]) -> ChannelSummary {
    let mut positive = 0;
    let mut neutral = 0;
    let mut negative = 0;
    let mut score_sum = 0.0f32;

    for mention in mentions {
        match mention.sentiment_label {
            SentimentLabel::Positive => positive += 1,
            SentimentLabel::Neutral => neutral += 1,
            SentimentLabel::Negative => negative += 1,
        }
        score_sum += mention.sentiment_score;
    }

    let total = mentions.len() as u64;
    ChannelSummary {
        channel,
        total,
        positive,
        neutral,
        negative,
        mean_score: if total > 0 {
            score_sum / total as f32
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn mention(channel: SocialChannel, score: f32) -> SocialMention {
        SocialMention {
            id: Uuid::new_v4(),
            channel,
            author: "reviewer".to_string(),
            content: "text".to_string(),
            posted_at: Utc::now(),
            sentiment_score: score,
            sentiment_label: SentimentLabel::from_score(score),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summary_counts_labels_and_averages() {
        let mentions = vec![
            mention(SocialChannel::Facebook, 1.0),
            mention(SocialChannel::Facebook, -1.0),
            mention(SocialChannel::Facebook, 0.0),
        ];
        let refs: Vec<&SocialMention> = mentions.iter().collect();

        let summary = summarize_channel(SocialChannel::Facebook, &refs);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.positive, 1);
        assert_eq!(summary.neutral, 1);
        assert_eq!(summary.negative, 1);
        assert!(summary.mean_score.abs() < f32::EPSILON);
    }
}
