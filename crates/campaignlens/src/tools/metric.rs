#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Average,
}

/// Metrics that can be ranked or charted straight from `campaign_metrics`
/// columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricColumn {
    Impressions,
    Clicks,
    Reach,
    Spend,
    Conversions,
    EngagementRate,
    Cpm,
    Roas,
}

impl MetricColumn {
    pub const ALL: [Self; 8] = [
        Self::Impressions,
        Self::Clicks,
        Self::Reach,
        Self::Spend,
        Self::Conversions,
        Self::EngagementRate,
        Self::Cpm,
        Self::Roas,
    ];

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let candidate = raw.trim();
        Self::ALL
            .into_iter()
            .find(|metric| metric.key().eq_ignore_ascii_case(candidate))
    }

    /// Unrecognized names fall back to summed impressions.
    #[must_use]
    pub fn resolve(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::Impressions)
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::Reach => "reach",
            Self::Spend => "spend",
            Self::Conversions => "conversions",
            Self::EngagementRate => "engagement_rate",
            Self::Cpm => "cpm",
            Self::Roas => "roas",
        }
    }

    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::Reach => "reach",
            Self::Spend => "spend_hourly",
            Self::Conversions => "conversion_count",
            Self::EngagementRate => "engagement_rate",
            Self::Cpm => "cost_per_thousand",
            Self::Roas => "return_on_ad_spend",
        }
    }

    #[must_use]
    pub const fn aggregation(self) -> Aggregation {
        match self {
            Self::Impressions | Self::Clicks | Self::Reach | Self::Spend | Self::Conversions => {
                Aggregation::Sum
            }
            Self::EngagementRate | Self::Cpm | Self::Roas => Aggregation::Average,
        }
    }

    /// Aggregate SQL expression over the metrics table aliased as `table_alias`.
    #[must_use]
    pub fn aggregate_sql(self, table_alias: &str) -> String {
        let column = self.column();
        match self.aggregation() {
            Aggregation::Sum => format!("COALESCE(SUM({table_alias}.{column}), 0)"),
            Aggregation::Average => format!("COALESCE(AVG({table_alias}.{column}), 0.0)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Aggregation, MetricColumn};

    #[test]
    fn parses_known_metric_names() {
        assert_eq!(MetricColumn::parse("spend"), Some(MetricColumn::Spend));
        assert_eq!(MetricColumn::parse(" CPM "), Some(MetricColumn::Cpm));
        assert_eq!(MetricColumn::parse("ctr"), None);
    }

    #[test]
    fn unknown_metric_falls_back_to_impressions() {
        assert_eq!(MetricColumn::resolve("attention"), MetricColumn::Impressions);
        assert_eq!(MetricColumn::resolve(""), MetricColumn::Impressions);
    }

    #[test]
    fn rate_metrics_are_averaged() {
        assert_eq!(MetricColumn::Roas.aggregation(), Aggregation::Average);
        assert_eq!(MetricColumn::Conversions.aggregation(), Aggregation::Sum);
        assert_eq!(
            MetricColumn::Cpm.aggregate_sql("m"),
            "COALESCE(AVG(m.cost_per_thousand), 0.0)"
        );
        assert_eq!(
            MetricColumn::Spend.aggregate_sql("m"),
            "COALESCE(SUM(m.spend_hourly), 0)"
        );
    }
}
