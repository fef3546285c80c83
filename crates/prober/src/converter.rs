use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    aggregate, BatchProber, FixedDelay, HttpPageFetcher, Identifier, IdentifierTemplate, Outcome,
    PacingPolicy, PageFetcher, PriceTier, ProbeError, ProbeResult, ProberConfig, ProgressSink,
    Result, TargetValidator,
};

/// Everything learned about one booking URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub hotel_name: Option<String>,
    /// Price shown for the unmodified URL, when it was looked up and priced.
    pub initial_price: Option<f64>,
    pub priced: Vec<ProbeResult>,
    pub tiers: Vec<PriceTier>,
    pub cheapest: Option<ProbeResult>,
    pub total_probed: usize,
    pub found_count: usize,
    pub sold_out_count: usize,
    pub failed_count: usize,
}

pub struct Converter {
    config: Arc<ProberConfig>,
    validator: TargetValidator,
    template: IdentifierTemplate,
    prober: BatchProber,
}

impl Converter {
    /// Converter backed by the HTTP page fetcher and a fixed inter-chunk delay.
    pub fn new(config: ProberConfig) -> Result<Self> {
        let config = Arc::new(config);
        let fetcher = Arc::new(HttpPageFetcher::new(config.clone())?);
        let pacing = Arc::new(FixedDelay(config.batch_delay));
        Self::build(config, fetcher, pacing)
    }

    pub fn with_fetcher(
        config: ProberConfig,
        fetcher: Arc<dyn PageFetcher>,
        pacing: Arc<dyn PacingPolicy>,
    ) -> Result<Self> {
        Self::build(Arc::new(config), fetcher, pacing)
    }

    fn build(
        config: Arc<ProberConfig>,
        fetcher: Arc<dyn PageFetcher>,
        pacing: Arc<dyn PacingPolicy>,
    ) -> Result<Self> {
        config.validate()?;
        let validator = TargetValidator::from_config(&config)?;
        let template = IdentifierTemplate::new(&config.identifier_param)?;
        let prober = BatchProber::new(fetcher, pacing, config.concurrency_limit);

        Ok(Self {
            config,
            validator,
            template,
            prober,
        })
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    pub fn validator(&self) -> &TargetValidator {
        &self.validator
    }

    pub async fn convert(
        &self,
        url: &str,
        identifiers: &[Identifier],
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Conversion> {
        let target = self.validator.validate(Some(url))?;
        if identifiers.is_empty() {
            return Err(ProbeError::EmptyCatalog);
        }
        let base_url = url.trim();

        info!(
            target = %target,
            identifiers = identifiers.len(),
            concurrency = self.prober.concurrency_limit(),
            "Starting conversion"
        );

        let baseline = if self.config.baseline_lookup {
            Some(self.prober.fetcher().fetch(base_url).await)
        } else {
            None
        };

        let results = self
            .prober
            .probe_all(&self.template, base_url, identifiers, progress)
            .await?;
        let ranking = aggregate(&results);
        let tiers = ranking.tiers();

        let mut hotel_name = ranking
            .cheapest
            .as_ref()
            .and_then(|r| r.hotel_name())
            .map(str::to_string);

        if hotel_name.is_none() {
            let fallback = match &baseline {
                Some(outcome) => outcome.clone(),
                None => self.prober.fetcher().fetch(base_url).await,
            };
            hotel_name = fallback.hotel_name().map(str::to_string);
            if hotel_name.is_none() {
                warn!(target = %target, "Hotel name unavailable");
            }
        }

        let sold_out_count = results.iter().filter(|r| r.sold_out()).count();
        let failed_count = results.iter().filter(|r| r.failed()).count();

        let conversion = Conversion {
            hotel_name,
            initial_price: baseline.as_ref().and_then(Outcome::price),
            total_probed: results.len(),
            found_count: ranking.priced.len(),
            sold_out_count,
            failed_count,
            tiers,
            cheapest: ranking.cheapest,
            priced: ranking.priced,
        };

        info!(
            target = %target,
            probed = conversion.total_probed,
            found = conversion.found_count,
            sold_out = conversion.sold_out_count,
            failed = conversion.failed_count,
            cheapest = ?conversion.cheapest.as_ref().and_then(|r| r.price()),
            "Conversion complete"
        );

        Ok(conversion)
    }
}
