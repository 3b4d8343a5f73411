use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapters::http::ApiClient;
use crate::config::ScoringConfig;
use crate::error::{AppError, Result};
use crate::models::{AccountHealth, Customer, Invoice, PaymentRecord, RiskLevel, Strategy};

/// Everything the scoring capability sees about one (customer, invoice) pair.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringInput {
    pub invoice: Invoice,
    pub customer: Customer,
    pub payment_history: Vec<PaymentRecord>,
    pub account_health: AccountHealth,
}

impl ScoringInput {
    pub fn new(invoice: Invoice, customer: Customer) -> Self {
        Self {
            payment_history: customer.payment_history.0.clone(),
            account_health: customer.account_health,
            invoice,
            customer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringOutput {
    pub strategy: Strategy,

    /// Expected to lie in 0-100
    pub confidence: i32,

    pub risk_assessment: RiskLevel,

    pub draft_content: String,

    pub reasoning: String,
}

impl ScoringOutput {
    /// Rejects answers that break the recommendation invariants.
    pub fn validate(&self, scorer: &str) -> Result<()> {
        if !(0..=100).contains(&self.confidence) {
            return Err(AppError::external_service(
                scorer,
                format!("Confidence {} outside 0-100", self.confidence),
            ));
        }
        if self.draft_content.trim().is_empty() {
            return Err(AppError::external_service(scorer, "Empty draft content"));
        }
        Ok(())
    }
}

/// Opaque analysis capability behind the recommendation generator.
#[async_trait]
pub trait RecommendationScorer: Send + Sync {
    async fn analyze(&self, input: &ScoringInput) -> Result<ScoringOutput>;

    fn name(&self) -> &str {
        "scoring"
    }
}

/// Deterministic scorer driven by days overdue, account health and how
/// reliably the customer has paid before.
#[derive(Debug, Clone, Default)]
pub struct RulesScorer;

impl RulesScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn strategy_for(days_overdue: i32, health: AccountHealth) -> Strategy {
        match health {
            AccountHealth::Churning => Strategy::PersonalOutreach,
            _ if days_overdue > 45 => Strategy::PersonalOutreach,
            AccountHealth::Good if days_overdue <= 14 => Strategy::GentleReminder,
            _ => Strategy::UrgentNotice,
        }
    }

    pub fn risk_for(days_overdue: i32, health: AccountHealth) -> RiskLevel {
        match health {
            AccountHealth::Churning => RiskLevel::High,
            _ if days_overdue > 60 => RiskLevel::High,
            AccountHealth::AtRisk => RiskLevel::Medium,
            _ if days_overdue > 30 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    /// Starts at 60, gains up to 25 from payment history depth and up to 15
    /// from how punctual that history is.
    pub fn confidence_for(history: &[PaymentRecord]) -> i32 {
        if history.is_empty() {
            return 60;
        }
        let depth = (history.len().min(5) * 5) as i32;
        let avg_late = history.iter().map(PaymentRecord::days_late).sum::<i64>() as f64
            / history.len() as f64;
        let punctuality = if avg_late <= 0.0 {
            15
        } else if avg_late <= 15.0 {
            8
        } else {
            0
        };
        (60 + depth + punctuality).clamp(0, 100)
    }

    fn draft(strategy: Strategy, input: &ScoringInput) -> String {
        let context = format!(
            "invoice {} for {} (due {})",
            input.invoice.invoice_number, input.invoice.amount, input.invoice.due_date
        );
        match strategy {
            Strategy::GentleReminder => format!(
                "Dear {},\n\nThis is a friendly reminder regarding {}. \
                We wanted to gently remind you that payment is now due. \
                We appreciate your prompt attention to this matter.\n\n\
                Thank you for your business!",
                input.customer.name, context
            ),
            Strategy::UrgentNotice => format!(
                "Dear {},\n\nThis is an urgent reminder regarding {}. \
                Payment is now {} days overdue and requires immediate attention. \
                Please arrange payment as soon as possible.",
                input.customer.name, context, input.invoice.days_overdue
            ),
            Strategy::PersonalOutreach => format!(
                "Call {} about {}. The balance is {} days overdue; \
                agree a payment date or plan on the call and log the commitment.",
                input.customer.name, context, input.invoice.days_overdue
            ),
        }
    }
}

#[async_trait]
impl RecommendationScorer for RulesScorer {
    async fn analyze(&self, input: &ScoringInput) -> Result<ScoringOutput> {
        let days = input.invoice.days_overdue;
        let strategy = Self::strategy_for(days, input.account_health);
        let risk = Self::risk_for(days, input.account_health);
        let confidence = Self::confidence_for(&input.payment_history);

        let reasoning = format!(
            "{} days overdue, account health {}, {} payments on record",
            days,
            input.account_health,
            input.payment_history.len()
        );

        Ok(ScoringOutput {
            draft_content: Self::draft(strategy, input),
            strategy,
            confidence,
            risk_assessment: risk,
            reasoning,
        })
    }

    fn name(&self) -> &str {
        "rules"
    }
}

/// Scorer backed by a hosted analysis endpoint (`POST {api_url}/analyze`).
pub struct HttpScorer {
    client: ApiClient,
}

impl HttpScorer {
    pub fn new(config: &ScoringConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(&config.api_url, config.api_token.clone(), "scoring", timeout)?,
        })
    }
}

#[async_trait]
impl RecommendationScorer for HttpScorer {
    async fn analyze(&self, input: &ScoringInput) -> Result<ScoringOutput> {
        info!(
            "Requesting hosted analysis for invoice {}",
            input.invoice.invoice_number
        );
        let output: ScoringOutput = self.client.post("/analyze", input).await?;
        if let Err(e) = output.validate(self.client.service_name()) {
            warn!("Hosted scorer returned an invalid answer: {}", e);
            return Err(e);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        self.client.service_name()
    }
}
