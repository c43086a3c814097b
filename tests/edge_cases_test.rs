//! Edge case tests for parsing, ingestion and aggregation.
//!
//! Exercises the public library API end to end without the binary.

use statement_mailer::{
    CancelToken, CsvIngestor, Money, ParseError, ProcessError, Summary, Transaction, TxKind,
};
use std::io::Cursor;
use std::str::FromStr;

fn money(s: &str) -> Money {
    Money::from_str(s).unwrap()
}

fn ingest(csv: &str) -> Result<Vec<Transaction>, ProcessError> {
    CsvIngestor::new()
        .with_default_year(2024)
        .ingest_reader(Cursor::new(csv), &CancelToken::new())
}

fn summarize(csv: &str) -> Summary {
    Summary::aggregate(&ingest(csv).unwrap()).unwrap()
}

// ==================== PARSING ====================

#[test]
fn test_sign_decides_kind_for_many_amounts() {
    for n in ["0", "0.01", "1", "60.5", "999999999999.9999", "1000000"] {
        let credit = Transaction::parse_in_year("1", "7/15", &format!("+{}", n), 2024).unwrap();
        assert_eq!(credit.kind(), TxKind::Credit);
        assert_eq!(credit.amount(), money(n));

        let debit = Transaction::parse_in_year("1", "7/15", &format!("-{}", n), 2024).unwrap();
        assert_eq!(debit.kind(), TxKind::Debit);
        assert_eq!(debit.amount(), money(n));

        assert_eq!(
            Transaction::parse_in_year("1", "7/15", n, 2024),
            Err(ParseError::InvalidAmount)
        );
    }
}

#[test]
fn test_amount_is_never_negative() {
    let tx = Transaction::parse_in_year("1", "7/15", "-0.0001", 2024).unwrap();
    assert!(!tx.amount().is_sign_negative());
    assert!(tx.signed_amount().is_sign_negative());
}

#[test]
fn test_negative_and_large_ids() {
    let tx = Transaction::parse_in_year("-7", "7/15", "+1", 2024).unwrap();
    assert_eq!(tx.id(), -7);

    let tx = Transaction::parse_in_year("9223372036854775807", "7/15", "+1", 2024).unwrap();
    assert_eq!(tx.id(), i64::MAX);

    assert_eq!(
        Transaction::parse_in_year("9223372036854775808", "7/15", "+1", 2024),
        Err(ParseError::InvalidId)
    );
}

#[test]
fn test_short_date_prefers_two_digit_year() {
    let tx = Transaction::parse_in_year("1", "7/2/24", "+1", 1999).unwrap();
    assert_eq!(tx.month_label(), "July 2024");
}

// ==================== AGGREGATION ====================

#[test]
fn test_end_to_end_example() {
    let summary = summarize(
        "Id,Date,Transaction
1,7/15,+60.5
2,7/28,-10.3
3,8/2,-20.46
4,8/13,+10
5,7/18,+15.25",
    );

    assert_eq!(summary.total_balance(), money("54.99"));
    assert_eq!(summary.count_for("July 2024"), 3);
    assert_eq!(summary.count_for("August 2024"), 2);
    assert_eq!(summary.monthly_transactions().len(), 2);
    assert_eq!(summary.average_credit(), money("85.75").div_count(3));
    assert_eq!(summary.average_debit(), money("30.76").div_count(2));
}

#[test]
fn test_balance_is_exact_difference_of_sides() {
    let amounts = ["0.1", "0.2", "0.3", "19.99", "0.07", "100", "33.33"];
    let mut csv = String::from("Id,Date,Transaction\n");
    let mut credits = Money::ZERO;
    let mut debits = Money::ZERO;

    for (i, amount) in amounts.iter().cycle().take(70).enumerate() {
        if i % 3 == 0 {
            csv.push_str(&format!("{},{}/1,-{}\n", i, i % 12 + 1, amount));
            debits += money(amount);
        } else {
            csv.push_str(&format!("{},{}/1,+{}\n", i, i % 12 + 1, amount));
            credits += money(amount);
        }
    }

    let first = summarize(&csv);
    let second = summarize(&csv);

    assert_eq!(first.total_balance(), credits - debits);
    assert_eq!(first, second);
    assert_eq!(first.transaction_count(), 70);

    let month_credits: Money = first.monthly_credits().values().copied().sum();
    let month_debits: Money = first.monthly_debits().values().copied().sum();
    assert_eq!(month_credits, credits);
    assert_eq!(month_debits, debits);
}

#[test]
fn test_zero_amounts_count_toward_averages() {
    let summary = summarize(
        "Id,Date,Transaction
1,7/1,+0
2,7/2,+10",
    );
    assert_eq!(summary.average_credit(), money("5"));
    assert!(summary.average_debit().is_zero());
}

#[test]
fn test_years_are_separate_buckets() {
    let summary = summarize(
        "Id,Date,Transaction
1,7/1/2023,+1
2,7/1/2024,+1
3,7/31,+1",
    );
    assert_eq!(summary.count_for("July 2023"), 1);
    assert_eq!(summary.count_for("July 2024"), 2);
}

// ==================== INGESTION ====================

#[test]
fn test_undecodable_row_keeps_rows_on_both_sides() {
    let bytes: &[u8] = b"Id,Date,Transaction\n1,7/15,+1\n2,7/16,+\xff\n3,7/17,-3\n";
    let txs = CsvIngestor::new()
        .with_default_year(2024)
        .ingest_reader(bytes, &CancelToken::new())
        .unwrap();

    let ids: Vec<i64> = txs.iter().map(|t| t.id()).collect();
    assert_eq!(ids, [1, 3]);
}

#[test]
fn test_unterminated_quote_swallows_rest_without_failing() {
    let txs = ingest(
        "Id,Date,Transaction
1,7/15,+1
2,7/16,\"unterminated
3,7/17,+3",
    )
    .unwrap();

    let ids: Vec<i64> = txs.iter().map(|t| t.id()).collect();
    assert_eq!(ids, [1]);
}

#[test]
fn test_quoted_fields_are_accepted() {
    let txs = ingest(
        "Id,Date,Transaction
\"1\",\"7/15\",\"+60.5\"",
    )
    .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount(), money("60.5"));
}

#[test]
fn test_blank_lines_are_ignored() {
    let txs = ingest("Id,Date,Transaction\n\n1,7/15,+1\n\n\n2,7/16,-1\n").unwrap();
    assert_eq!(txs.len(), 2);
}

#[test]
fn test_crlf_line_endings() {
    let txs = ingest("Id,Date,Transaction\r\n1,7/15,+1\r\n2,7/16,-1\r\n").unwrap();
    assert_eq!(txs.len(), 2);
}

#[test]
fn test_wrong_header_returns_no_rows() {
    let result = ingest(
        "Id,Date,Amount
1,7/15,+1",
    );
    assert!(matches!(result, Err(ProcessError::InvalidFormat { .. })));
}

#[test]
fn test_header_is_case_sensitive() {
    let result = ingest("ID,DATE,TRANSACTION\n1,7/15,+1\n");
    assert!(matches!(result, Err(ProcessError::InvalidFormat { .. })));
}

#[test]
fn test_header_columns_must_be_in_order() {
    let result = ingest("Date,Id,Transaction\n7/15,1,+1\n");
    assert!(matches!(result, Err(ProcessError::InvalidFormat { .. })));
}
