use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TransactionError;
use crate::posting::{Posting, DEFAULT_CURRENCY, OPENING_BALANCE_ID};
use crate::tags::{serialize_comment, Tags, ID_TAG};

/// Date format used by the ledger text format.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// A dated, payee-labelled group of postings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    pub date: NaiveDate,
    pub payee: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    pub postings: Vec<Posting>,
}

impl Transaction {
    pub fn new(date: NaiveDate, payee: impl Into<String>) -> Self {
        Self {
            date,
            payee: payee.into(),
            comment: String::new(),
            tags: Tags::new(),
            postings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_posting(mut self, posting: Posting) -> Self {
        self.postings.push(posting);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Identity carried by the reserved `id` tag, empty for anonymous transactions.
    pub fn id(&self) -> &str {
        self.tags.get(ID_TAG).map(String::as_str).unwrap_or("")
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.tags.insert(ID_TAG.to_string(), id.into());
    }

    /// Every non-empty transaction and posting ID, transaction first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id())
            .chain(self.postings.iter().map(Posting::id))
            .filter(|id| !id.is_empty())
    }

    pub fn is_opening_balance(&self) -> bool {
        self.id() == OPENING_BALANCE_ID || self.postings.iter().any(Posting::is_opening_balance)
    }

    /// Sum of every posting amount; missing amounts count as zero.
    pub fn total(&self) -> Decimal {
        self.postings.iter().map(Posting::value).sum()
    }

    /// Fill in a single elided amount so the postings sum to zero.
    ///
    /// Fails when fewer than two postings exist, when more than one amount is missing, or when
    /// fully specified amounts do not sum to zero.
    pub fn balance(&mut self) -> Result<(), TransactionError> {
        if self.postings.len() < 2 {
            return Err(TransactionError::TooFewPostings(self.postings.len()));
        }
        let missing: Vec<usize> = self
            .postings
            .iter()
            .enumerate()
            .filter(|(_, posting)| posting.amount.is_none())
            .map(|(ix, _)| ix)
            .collect();
        let sum = self.total();
        match missing.as_slice() {
            [] if sum.is_zero() => Ok(()),
            [] => Err(TransactionError::Unbalanced(sum)),
            [ix] => {
                let currency = self
                    .postings
                    .iter()
                    .find(|posting| posting.amount.is_some())
                    .map(|posting| posting.currency.clone())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
                let posting = &mut self.postings[*ix];
                posting.amount = Some(if sum.is_zero() { Decimal::ZERO } else { -sum });
                posting.currency = currency;
                Ok(())
            }
            _ => Err(TransactionError::AmbiguousAmount(missing.len())),
        }
    }

    /// Structural check without inference: two or more postings, all amounts present, zero sum.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.postings.len() < 2 {
            return Err(TransactionError::TooFewPostings(self.postings.len()));
        }
        if let Some(posting) = self.postings.iter().find(|p| p.amount.is_none()) {
            return Err(TransactionError::MissingAmount(posting.account.clone()));
        }
        let sum = self.total();
        if !sum.is_zero() {
            return Err(TransactionError::Unbalanced(sum));
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let account_width = self
            .postings
            .iter()
            .map(|p| p.account.chars().count())
            .max()
            .unwrap_or(0);
        let amount_width = self
            .postings
            .iter()
            .filter_map(|p| p.amount)
            .map(|amount| amount.to_string().len())
            .max()
            .unwrap_or(0);
        writeln!(
            f,
            "{} {}{}",
            self.date.format(DATE_FORMAT),
            self.payee,
            serialize_comment(&self.comment, &self.tags)
        )?;
        for posting in &self.postings {
            writeln!(f, "    {}", posting.format_table(account_width, amount_width))?;
        }
        Ok(())
    }
}

/// Stable sort by date; postings on the same date keep their relative order.
pub fn sort_by_date(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|txn| txn.date);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn infers_single_missing_amount() {
        let mut txn = Transaction::new(date(2019, 1, 2), "burger")
            .with_posting(Posting::elided("A"))
            .with_posting(Posting::new("B", dec!(1.25)));
        txn.balance().unwrap();
        assert_eq!(txn.postings[0].amount, Some(dec!(-1.25)));
        assert_eq!(txn.postings[1].amount, Some(dec!(1.25)));
        txn.validate().unwrap();
    }

    #[test]
    fn inferred_posting_takes_first_currency() {
        let mut eur = Posting::new("B", dec!(3));
        eur.currency = "EUR".into();
        let mut txn = Transaction::new(date(2019, 1, 2), "p")
            .with_posting(eur)
            .with_posting(Posting::elided("A"));
        txn.balance().unwrap();
        assert_eq!(txn.postings[1].currency, "EUR");
        assert_eq!(txn.postings[1].amount, Some(dec!(-3)));
    }

    #[test]
    fn rejects_unbalanced_and_ambiguous() {
        let mut unbalanced = Transaction::new(date(2019, 1, 2), "p")
            .with_posting(Posting::new("A", dec!(1.25)))
            .with_posting(Posting::new("B", dec!(-5.00)));
        assert_eq!(
            unbalanced.balance(),
            Err(TransactionError::Unbalanced(dec!(-3.75)))
        );

        let mut ambiguous = Transaction::new(date(2019, 1, 2), "p")
            .with_posting(Posting::elided("A"))
            .with_posting(Posting::elided("B"));
        assert_eq!(
            ambiguous.balance(),
            Err(TransactionError::AmbiguousAmount(2))
        );

        let mut lonely =
            Transaction::new(date(2019, 1, 2), "p").with_posting(Posting::new("A", dec!(0)));
        assert_eq!(lonely.balance(), Err(TransactionError::TooFewPostings(1)));
    }

    #[test]
    fn validate_does_not_infer() {
        let txn = Transaction::new(date(2019, 1, 2), "p")
            .with_posting(Posting::elided("A"))
            .with_posting(Posting::new("B", dec!(1)));
        assert_eq!(
            txn.validate(),
            Err(TransactionError::MissingAmount("A".into()))
        );
    }

    #[test]
    fn collects_ids() {
        let txn = Transaction::new(date(2019, 1, 2), "p")
            .with_id("A")
            .with_posting(Posting::new("x", dec!(1)).with_id("B"))
            .with_posting(Posting::new("y", dec!(-1)));
        assert_eq!(txn.ids().collect::<Vec<_>>(), vec!["A", "B"]);
        let anonymous = Transaction::new(date(2019, 1, 2), "p");
        assert_eq!(anonymous.ids().count(), 0);
    }

    #[test]
    fn renders_aligned_columns() {
        let txn = Transaction::new(date(2019, 1, 2), "some burger place")
            .with_id("A")
            .with_posting(Posting::new("expenses:food", dec!(1.25)).with_id("B"))
            .with_posting(Posting::new("assets:Bank 1", dec!(-1.25)).with_id("C"));
        assert_eq!(
            txn.to_string(),
            "2019/01/02 some burger place ; id: A\n    expenses:food   $ 1.25 ; id: B\n    assets:Bank 1  $ -1.25 ; id: C\n"
        );
    }

    #[test]
    fn sort_is_stable() {
        let mut txns = vec![
            Transaction::new(date(2019, 1, 3), "c"),
            Transaction::new(date(2019, 1, 1), "a"),
            Transaction::new(date(2019, 1, 3), "d"),
            Transaction::new(date(2019, 1, 1), "b"),
        ];
        sort_by_date(&mut txns);
        let payees: Vec<_> = txns.iter().map(|t| t.payee.as_str()).collect();
        assert_eq!(payees, ["a", "b", "c", "d"]);
    }
}
