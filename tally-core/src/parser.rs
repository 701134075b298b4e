//! Line oriented reader for the plain-text ledger format.
//!
//! ```text
//! 2019/01/02 some burger place ; id: A
//!     expenses:food   $ 1.25 ; id: B
//!     assets:Bank 1  $ -1.25 ; id: C
//! ```

use std::io::BufRead;

use chrono::NaiveDate;

use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::posting::Posting;
use crate::tags::parse_tags;
use crate::transaction::{Transaction, DATE_FORMAT};

/// Parse every transaction in `reader`, balancing each one as it closes.
pub fn parse_transactions<R: BufRead>(reader: R) -> ParseResult<Vec<Transaction>> {
    let mut transactions = Vec::new();
    let mut pending: Option<(usize, Transaction)> = None;

    for (ix, line) in reader.lines().enumerate() {
        let line_no = ix + 1;
        let line =
            line.map_err(|err| ParseError::new(line_no, ParseErrorKind::Io(err.to_string())))?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with(';') {
            finish(pending.take(), &mut transactions)?;
            continue;
        }

        if line.starts_with(|c: char| c == ' ' || c == '\t') {
            let Some((_, txn)) = pending.as_mut() else {
                return Err(ParseError::new(
                    line_no,
                    ParseErrorKind::OrphanPosting(trimmed.to_string()),
                ));
            };
            let posting = Posting::parse(&line).map_err(|kind| ParseError::new(line_no, kind))?;
            txn.postings.push(posting);
            continue;
        }

        finish(pending.take(), &mut transactions)?;
        let txn = parse_header(&line).map_err(|kind| ParseError::new(line_no, kind))?;
        pending = Some((line_no, txn));
    }

    finish(pending, &mut transactions)?;
    Ok(transactions)
}

/// Convenience wrapper over [`parse_transactions`] for in-memory text.
pub fn parse_str(text: &str) -> ParseResult<Vec<Transaction>> {
    parse_transactions(text.as_bytes())
}

fn finish(
    pending: Option<(usize, Transaction)>,
    transactions: &mut Vec<Transaction>,
) -> ParseResult<()> {
    if let Some((line_no, mut txn)) = pending {
        txn.balance()
            .map_err(|err| ParseError::new(line_no, err.into()))?;
        transactions.push(txn);
    }
    Ok(())
}

fn parse_header(line: &str) -> Result<Transaction, ParseErrorKind> {
    let (head, comment) = match line.split_once(';') {
        Some((head, comment)) => (head, Some(comment)),
        None => (line, None),
    };
    let head = head.trim();
    let (date_text, payee) = head
        .split_once(char::is_whitespace)
        .unwrap_or((head, ""));
    let date = NaiveDate::parse_from_str(date_text, DATE_FORMAT)
        .map_err(|_| ParseErrorKind::InvalidDate(date_text.to_string()))?;
    let payee = payee.trim();
    if payee.is_empty() {
        return Err(ParseErrorKind::MissingPayee);
    }

    let mut txn = Transaction::new(date, payee);
    if let Some(comment) = comment {
        (txn.comment, txn.tags) = parse_tags(comment.trim());
    }
    Ok(txn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransactionError;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_round_trip_example() {
        let text = "2019/01/02 some burger place ; id: A\n    expenses:food   $ 1.25 ; id: B\n    assets:Bank 1  $ -1.25 ; id: C\n";
        let txns = parse_str(text).unwrap();
        assert_eq!(txns.len(), 1);
        let txn = &txns[0];
        assert_eq!(txn.date, NaiveDate::from_ymd_opt(2019, 1, 2).unwrap());
        assert_eq!(txn.payee, "some burger place");
        assert_eq!(txn.id(), "A");
        assert_eq!(txn.postings[0].id(), "B");
        assert_eq!(txn.postings[1].amount, Some(dec!(-1.25)));
        assert_eq!(txn.to_string(), text);
    }

    #[test]
    fn infers_elided_amount() {
        let txns = parse_str("2019/01/02 p\n    A\n    B  $ 1.25\n").unwrap();
        assert_eq!(txns[0].postings[0].amount, Some(dec!(-1.25)));
    }

    #[test]
    fn separators_end_transactions() {
        let text = "\
2019/01/02 first
    a  $ 1
    b

; a note between transactions
2019/01/03 second ; groceries
\tc  $ 2
\td
2019/01/04 third
    e  $ 3
    f
";
        let txns = parse_str(text).unwrap();
        let payees: Vec<_> = txns.iter().map(|t| t.payee.as_str()).collect();
        assert_eq!(payees, ["first", "second", "third"]);
        assert_eq!(txns[1].comment, "groceries");
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = parse_str("2019/01/02 p\n    a  $ 1\n    b\n\n    c  $ 2\n").unwrap_err();
        assert_eq!(err.line, 5);
        assert!(matches!(err.kind, ParseErrorKind::OrphanPosting(_)));

        let err = parse_str("2019-01-02 p\n    a  $ 1\n    b\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::new(1, ParseErrorKind::InvalidDate("2019-01-02".into()))
        );

        let err = parse_str("2019/01/02 ; id: A\n    a  $ 1\n    b\n").unwrap_err();
        assert_eq!(err, ParseError::new(1, ParseErrorKind::MissingPayee));

        let err = parse_str("\n2019/01/02 p\n    a  $ 1.25\n    b  $ -5.00\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::new(
                2,
                ParseErrorKind::Transaction(TransactionError::Unbalanced(dec!(-3.75)))
            )
        );

        let err = parse_str("2019/01/02 p\n    a  $ 1\n").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::Transaction(TransactionError::TooFewPostings(1))
        );

        let err = parse_str("2019/01/02 p\n    a  $ 1x\n    b\n").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
