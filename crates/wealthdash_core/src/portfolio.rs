//! Portfolio data gathered through live sessions: per-account fetches,
//! cross-account aggregation, headline metrics, and worksheet tables for
//! the export.

use serde::Serialize;

use crate::entities::{AccountId, AccountSnapshot, Holding, SessionHandle, Trade};
use crate::error::Error;
use crate::ports::PortfolioSource;

/// Outcome of fetching one account. A failure here does not affect the
/// session registry; the session stays registered until disconnect.
#[derive(Debug)]
pub struct AccountFetch {
    pub account_id: AccountId,
    /// Holdings and trades; either failing fails the account
    pub result: Result<AccountSnapshot, Error>,
    /// Mutual fund fetch failure, reported without failing the account
    pub mf_error: Option<Error>,
}

impl AccountFetch {
    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }
}

/// Fetch holdings, trades, and mutual fund holdings for one session.
///
/// Holdings and trades decide whether the account was fetched. A mutual fund
/// failure leaves `mf_holdings` empty and is kept in `mf_error`.
pub async fn fetch_account_snapshot<P>(source: &P, session: &SessionHandle) -> AccountFetch
where
    P: PortfolioSource + ?Sized,
{
    let account_id = session.account_id().clone();
    let equity = async {
        let holdings = source.holdings(session).await?;
        let trades = source.trades(session).await?;
        Ok::<_, Error>((holdings, trades))
    }
    .await;

    let (holdings, trades) = match equity {
        Ok(rows) => rows,
        Err(e) => {
            return AccountFetch {
                account_id,
                result: Err(e),
                mf_error: None,
            }
        }
    };

    let (mf_holdings, mf_error) = match source.mf_holdings(session).await {
        Ok(rows) => (rows, None),
        Err(e) => (Vec::new(), Some(e)),
    };

    AccountFetch {
        result: Ok(AccountSnapshot {
            account_id: account_id.clone(),
            holdings,
            trades,
            mf_holdings,
        }),
        account_id,
        mf_error,
    }
}

/// Headline numbers over a set of holdings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PortfolioSummary {
    pub invested: f64,
    pub current_value: f64,
    pub pnl: f64,
    /// P&L as a percentage of invested value; 0 when nothing is invested
    pub pnl_percent: f64,
}

impl PortfolioSummary {
    pub fn from_holdings<'a, I>(holdings: I) -> Self
    where
        I: IntoIterator<Item = &'a Holding>,
    {
        let (invested, current_value) = holdings
            .into_iter()
            .fold((0.0, 0.0), |(inv, cur), h| {
                (inv + h.invested_value(), cur + h.current_value())
            });
        let pnl = current_value - invested;
        let pnl_percent = if invested > 0.0 {
            pnl * 100.0 / invested
        } else {
            0.0
        };

        Self {
            invested,
            current_value,
            pnl,
            pnl_percent,
        }
    }
}

/// Row tagged with the account it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tagged<T> {
    pub account_id: AccountId,
    #[serde(flatten)]
    pub row: T,
}

/// Rows of every successfully fetched account, concatenated
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedPortfolio {
    pub holdings: Vec<Tagged<Holding>>,
    pub trades: Vec<Tagged<Trade>>,
    pub summary: PortfolioSummary,
}

impl AggregatedPortfolio {
    /// Accounts whose fetch failed are left out
    pub fn from_fetches(fetches: &[AccountFetch]) -> Self {
        let mut holdings = Vec::new();
        let mut trades = Vec::new();

        for snapshot in fetches.iter().filter_map(|f| f.result.as_ref().ok()) {
            holdings.extend(snapshot.holdings.iter().map(|h| Tagged {
                account_id: snapshot.account_id.clone(),
                row: h.clone(),
            }));
            trades.extend(snapshot.trades.iter().map(|t| Tagged {
                account_id: snapshot.account_id.clone(),
                row: t.clone(),
            }));
        }

        let summary = PortfolioSummary::from_holdings(holdings.iter().map(|t| &t.row));
        Self {
            holdings,
            trades,
            summary,
        }
    }
}

/// A titled table destined for one spreadsheet tab
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Worksheet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

const HOLDINGS_HEADER: [&str; 8] = [
    "tradingsymbol",
    "exchange",
    "isin",
    "quantity",
    "average_price",
    "last_price",
    "pnl",
    "account_id",
];

const TRADES_HEADER: [&str; 9] = [
    "trade_id",
    "order_id",
    "tradingsymbol",
    "exchange",
    "transaction_type",
    "quantity",
    "average_price",
    "fill_timestamp",
    "account_id",
];

pub fn holdings_worksheet(snapshot: &AccountSnapshot) -> Worksheet {
    let id = snapshot.account_id.as_str();
    Worksheet {
        title: format!("Holdings_{}", id),
        header: HOLDINGS_HEADER.iter().map(|s| s.to_string()).collect(),
        rows: snapshot
            .holdings
            .iter()
            .map(|h| {
                vec![
                    h.tradingsymbol.clone(),
                    h.exchange.clone(),
                    h.isin.clone().unwrap_or_default(),
                    h.quantity.to_string(),
                    h.average_price.to_string(),
                    h.last_price.to_string(),
                    h.pnl.to_string(),
                    id.to_string(),
                ]
            })
            .collect(),
    }
}

pub fn trades_worksheet(snapshot: &AccountSnapshot) -> Worksheet {
    let id = snapshot.account_id.as_str();
    Worksheet {
        title: format!("Trades_{}", id),
        header: TRADES_HEADER.iter().map(|s| s.to_string()).collect(),
        rows: snapshot
            .trades
            .iter()
            .map(|t| {
                vec![
                    t.trade_id.clone(),
                    t.order_id.clone(),
                    t.tradingsymbol.clone(),
                    t.exchange.clone(),
                    t.transaction_type.clone(),
                    t.quantity.to_string(),
                    t.average_price.to_string(),
                    t.fill_timestamp.clone().unwrap_or_default(),
                    id.to_string(),
                ]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPortfolio;

    fn holding(symbol: &str, qty: f64, avg: f64, last: f64) -> Holding {
        Holding {
            tradingsymbol: symbol.to_string(),
            exchange: "NSE".to_string(),
            isin: None,
            quantity: qty,
            average_price: avg,
            last_price: last,
            pnl: (last - avg) * qty,
        }
    }

    fn trade(id: &str, side: &str) -> Trade {
        Trade {
            trade_id: id.to_string(),
            order_id: format!("O{}", id),
            tradingsymbol: "INFY".to_string(),
            exchange: "NSE".to_string(),
            transaction_type: side.to_string(),
            quantity: 1.0,
            average_price: 1500.0,
            fill_timestamp: Some("2024-03-15 10:00:00".to_string()),
        }
    }

    fn snapshot(id: &str, holdings: Vec<Holding>, trades: Vec<Trade>) -> AccountSnapshot {
        AccountSnapshot {
            account_id: AccountId::new(id),
            holdings,
            trades,
            mf_holdings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_mutual_fund_failure_keeps_equity_rows() {
        let source = MockPortfolio::default()
            .with_holdings("A1", vec![holding("INFY", 10.0, 100.0, 110.0)])
            .with_trades("A1", vec![trade("T1", "BUY")])
            .failing_mf_for("A1");
        let session = SessionHandle::for_testing("A1", "key", "token");

        let fetch = fetch_account_snapshot(&source, &session).await;

        let snapshot = fetch.result.as_ref().unwrap();
        assert_eq!(snapshot.holdings.len(), 1);
        assert_eq!(snapshot.trades.len(), 1);
        assert!(snapshot.mf_holdings.is_empty());
        assert!(matches!(fetch.mf_error, Some(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_equity_failure_fails_account() {
        let source = MockPortfolio::default().failing_for("A1");
        let session = SessionHandle::for_testing("A1", "key", "token");

        let fetch = fetch_account_snapshot(&source, &session).await;

        assert!(fetch.error().is_some());
        assert!(fetch.mf_error.is_none());
    }

    #[test]
    fn test_summary_from_holdings() {
        let holdings = [holding("INFY", 10.0, 100.0, 120.0), holding("TCS", 5.0, 200.0, 180.0)];
        let summary = PortfolioSummary::from_holdings(holdings.iter());

        assert_eq!(summary.invested, 2000.0);
        assert_eq!(summary.current_value, 2100.0);
        assert_eq!(summary.pnl, 100.0);
        assert_eq!(summary.pnl_percent, 5.0);
    }

    #[test]
    fn test_summary_of_nothing_is_zero() {
        let summary = PortfolioSummary::from_holdings(std::iter::empty());
        assert_eq!(summary, PortfolioSummary::default());
    }

    #[test]
    fn test_aggregate_skips_failed_accounts_and_tags_rows() {
        let fetches = vec![
            AccountFetch {
                account_id: AccountId::new("A1"),
                mf_error: None,
                result: Ok(snapshot(
                    "A1",
                    vec![holding("INFY", 10.0, 100.0, 110.0)],
                    vec![trade("1", "BUY")],
                )),
            },
            AccountFetch {
                account_id: AccountId::new("B2"),
                mf_error: None,
                result: Err(Error::Network("connection reset".to_string())),
            },
            AccountFetch {
                account_id: AccountId::new("C3"),
                mf_error: None,
                result: Ok(snapshot("C3", vec![holding("TCS", 1.0, 100.0, 100.0)], vec![])),
            },
        ];

        let aggregated = AggregatedPortfolio::from_fetches(&fetches);

        assert_eq!(aggregated.holdings.len(), 2);
        assert_eq!(aggregated.holdings[0].account_id.as_str(), "A1");
        assert_eq!(aggregated.holdings[1].account_id.as_str(), "C3");
        assert_eq!(aggregated.trades.len(), 1);
        assert_eq!(aggregated.summary.invested, 1100.0);
        assert!(fetches[1].error().is_some());
    }

    #[test]
    fn test_holdings_worksheet_shape() {
        let sheet = holdings_worksheet(&snapshot(
            "A1",
            vec![holding("INFY", 10.0, 1500.5, 1600.0)],
            vec![],
        ));

        assert_eq!(sheet.title, "Holdings_A1");
        assert_eq!(sheet.header.last().unwrap(), "account_id");
        assert_eq!(sheet.header.len(), sheet.rows[0].len());
        assert_eq!(
            sheet.rows[0],
            vec!["INFY", "NSE", "", "10", "1500.5", "1600", "995", "A1"]
        );
    }

    #[test]
    fn test_trades_worksheet_empty() {
        let sheet = trades_worksheet(&snapshot("A1", vec![], vec![]));
        assert_eq!(sheet.title, "Trades_A1");
        assert!(sheet.is_empty());
        assert_eq!(sheet.header.len(), 9);
    }
}
