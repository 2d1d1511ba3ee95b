use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::entities::SessionHandle;
use crate::portfolio::{fetch_account_snapshot, holdings_worksheet, trades_worksheet, Worksheet};
use crate::ports::{PortfolioSource, SpreadsheetExporter};

/// Notes produced by one sync run, in the order they happened
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub notes: Vec<String>,
    /// Every fetched account was written without error
    pub success: bool,
}

impl SyncReport {
    fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.notes.push(message);
    }
}

/// Export of every live session's holdings and trades into per-account worksheets
pub struct SyncPortfolioUseCase<P, X>
where
    P: PortfolioSource,
    X: SpreadsheetExporter,
{
    portfolio: Arc<P>,
    exporter: Arc<X>,
}

impl<P, X> SyncPortfolioUseCase<P, X>
where
    P: PortfolioSource,
    X: SpreadsheetExporter,
{
    pub fn new(portfolio: Arc<P>, exporter: Arc<X>) -> Self {
        Self {
            portfolio,
            exporter,
        }
    }

    pub fn portfolio(&self) -> &Arc<P> {
        &self.portfolio
    }

    /// Run one sync over `sessions`.
    ///
    /// Accounts whose fetch fails are skipped. The first write failure ends
    /// the run.
    #[instrument(skip(self, sessions), fields(accounts = sessions.len()))]
    pub async fn execute(&self, sessions: &[SessionHandle]) -> SyncReport {
        let mut report = SyncReport::default();
        report.note("Starting data fetch...");

        if sessions.is_empty() {
            report.note("No authenticated accounts to sync");
            return report;
        }

        for session in sessions {
            let fetch = fetch_account_snapshot(self.portfolio.as_ref(), session).await;
            if let Some(e) = &fetch.mf_error {
                warn!(account_id = %fetch.account_id, error = %e, "mutual fund fetch failed");
                report.note(format!("No mutual fund data for {}: {}", fetch.account_id, e));
            }
            let snapshot = match fetch.result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(account_id = %fetch.account_id, error = %e, "fetch failed");
                    report.note(format!("Skipping {}: {}", fetch.account_id, e));
                    continue;
                }
            };

            let id = &snapshot.account_id;
            let sheets = [
                ("Holdings", holdings_worksheet(&snapshot)),
                ("Trades", trades_worksheet(&snapshot)),
            ];

            for (label, sheet) in sheets {
                if sheet.is_empty() {
                    report.note(format!("No {} data for {}", label.to_lowercase(), id));
                    continue;
                }
                if let Err(e) = self.write(&sheet).await {
                    report.note(format!("Error writing to sheet: {}", e));
                    return report;
                }
                report.note(format!("{} updated for {}", label, id));
            }
        }

        report.success = true;
        report.note("All accounts synced successfully");
        report
    }

    async fn write(&self, sheet: &Worksheet) -> Result<(), crate::error::Error> {
        self.exporter.replace_worksheet(sheet).await
    }
}
