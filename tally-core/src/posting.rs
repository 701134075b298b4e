use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ParseErrorKind;
use crate::tags::{parse_tags, serialize_comment, Tags, ID_TAG};

/// Currency used when an amount carries no explicit symbol.
pub const DEFAULT_CURRENCY: &str = "$";
/// Reserved posting ID marking an opening-balance line.
pub const OPENING_BALANCE_ID: &str = "Opening-Balance";
/// Account prefix marking an opening-balance line.
pub const OPENING_BALANCE_ACCOUNT: &str = "equity:Opening Balance";
const EQUITY_PREFIX: &str = "equity:";

/// One account leg of a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Posting {
    pub account: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl Posting {
    pub fn new(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account: account.into(),
            amount: Some(amount),
            currency: DEFAULT_CURRENCY.to_string(),
            ..Self::default()
        }
    }

    /// A posting whose amount is left for the balancer to infer.
    pub fn elided(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = Some(balance);
        self
    }

    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_tag(ID_TAG, id)
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Identity carried by the reserved `id` tag, empty when absent.
    pub fn id(&self) -> &str {
        self.tags.get(ID_TAG).map(String::as_str).unwrap_or("")
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.tags.insert(ID_TAG.to_string(), id.into());
    }

    /// Amount used in arithmetic; a missing amount contributes nothing.
    pub fn value(&self) -> Decimal {
        self.amount.unwrap_or(Decimal::ZERO)
    }

    pub fn is_equity(&self) -> bool {
        self.account.starts_with(EQUITY_PREFIX)
    }

    pub fn is_opening_balance(&self) -> bool {
        self.is_equity()
            && (self.id() == OPENING_BALANCE_ID
                || self.account.starts_with(OPENING_BALANCE_ACCOUNT))
    }

    /// Parse an indented posting line:
    /// `ACCOUNT  [CURRENCY AMOUNT[ = CURRENCY BALANCE]][ ; COMMENT[ TAGS]]`.
    pub fn parse(line: &str) -> Result<Self, ParseErrorKind> {
        let mut posting = Posting::elided("");
        let body = match line.split_once(';') {
            Some((body, comment)) => {
                (posting.comment, posting.tags) = parse_tags(comment.trim());
                body
            }
            None => line,
        };

        let body = body.trim();
        let (account, rest) = split_account(body);
        if account.is_empty() {
            return Err(ParseErrorKind::MissingAccount(body.to_string()));
        }
        posting.account = account.to_string();
        let Some(rest) = rest else {
            return Ok(posting);
        };

        let (amount_text, balance_text) = match rest.split_once('=') {
            Some((amount, balance)) => (amount, Some(balance)),
            None => (rest, None),
        };
        let (currency, amount) = parse_amount(amount_text)
            .ok_or_else(|| ParseErrorKind::InvalidAmount(amount_text.trim().to_string()))?;
        posting.currency = currency;
        posting.amount = Some(amount);
        if let Some(balance_text) = balance_text {
            let (_, balance) = parse_amount(balance_text)
                .ok_or_else(|| ParseErrorKind::InvalidBalance(balance_text.trim().to_string()))?;
            posting.balance = Some(balance);
        }
        Ok(posting)
    }

    /// Render the posting with the account left-justified to `account_width` and the amount
    /// right-justified to `amount_width` (width of the bare number).
    pub fn format_table(&self, account_width: usize, amount_width: usize) -> String {
        let mut line = format!("{:<account_width$}", self.account);
        match self.amount {
            Some(amount) => {
                let amount = format!("{} {}", self.currency, amount);
                let width = amount_width + self.currency.chars().count() + 1;
                line.push_str("  ");
                line.push_str(&format!("{amount:>width$}"));
                if let Some(balance) = self.balance {
                    line.push_str(&format!(" = {} {}", self.currency, balance));
                }
            }
            None => line.truncate(line.trim_end().len()),
        }
        line.push_str(&serialize_comment(&self.comment, &self.tags));
        line
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_table(1, 1))
    }
}

impl FromStr for Posting {
    type Err = ParseErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Account and amount are separated by two or more spaces, or a tab.
fn split_account(body: &str) -> (&str, Option<&str>) {
    let separator = [body.find("  "), body.find('\t')]
        .into_iter()
        .flatten()
        .min();
    match separator {
        Some(ix) => {
            let rest = body[ix..].trim();
            (body[..ix].trim(), (!rest.is_empty()).then_some(rest))
        }
        None => (body, None),
    }
}

/// Split `CURRENCY AMOUNT` into its currency symbol and decimal value.
///
/// Thousands separators (`,`) are ignored and a missing symbol defaults to `$`.
pub fn parse_amount(text: &str) -> Option<(String, Decimal)> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        .unwrap_or(text.len());
    let currency = text[..split].trim();
    let number: String = text[split..]
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let amount = Decimal::from_str(&number).ok()?;
    let currency = if currency.is_empty() {
        DEFAULT_CURRENCY
    } else {
        currency
    };
    Some((currency.to_string(), amount))
}
