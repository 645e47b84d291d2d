pub mod campaign;
pub mod envelope;

pub use campaign::{
    AgentConversation, CampaignConfiguration, CampaignLocation, CampaignMetrics,
    DEFAULT_CAMPAIGN_STATUS, DisplayMaster, MetricsDataset, PERFORMANCE_DASHBOARD_AGENT,
    dataset_json_schema,
};
pub use envelope::{
    EnvelopeCommandFailure, RESPONSE_ENVELOPE_SCHEMA_VERSION, ResponseEnvelope,
    ResponseEnvelopeError, ResponseEnvelopeWarning,
};
