use std::{collections::BTreeMap, convert::Infallible, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Largest payload the memo program accepts in a single instruction.
pub const MAX_MEMO_BYTES: usize = 566;

pub const MEMO_KIND: &str = "proof_of_debt";
pub const MEMO_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum MemoError {
    #[error("employer name is empty")]
    MissingEmployer,

    #[error("due date is empty")]
    MissingDueDate,

    #[error("employee wallet {0:?} is not a valid base58 address")]
    InvalidWallet(String),

    #[error("encoded memo is {size} bytes, the memo program accepts at most {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("failed to serialize memo: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Amount owed, either free text carrying its unit ("5000 USD") or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DebtAmount {
    Number(serde_json::Number),
    Text(String),
}

/// Numbers stay numeric, anything else is kept verbatim as text.
impl From<&str> for DebtAmount {
    fn from(value: &str) -> Self {
        match serde_json::from_str::<serde_json::Number>(value.trim()) {
            Ok(number) => Self::Number(number),
            Err(_) => Self::Text(value.to_string()),
        }
    }
}

impl FromStr for DebtAmount {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtClaim {
    pub employer_name: String,
    pub employee_wallet: String,
    pub debt_amount: DebtAmount,
    pub due_date: String,
}

impl DebtClaim {
    pub fn validate(&self) -> Result<(), MemoError> {
        if self.employer_name.trim().is_empty() {
            return Err(MemoError::MissingEmployer);
        }
        if self.due_date.trim().is_empty() {
            return Err(MemoError::MissingDueDate);
        }
        match bs58::decode(&self.employee_wallet).into_vec() {
            Ok(bytes) if bytes.len() == 32 => Ok(()),
            _ => Err(MemoError::InvalidWallet(self.employee_wallet.clone())),
        }
    }
}

/// Encodes the claim as the memo payload.
///
/// The output is compact JSON with keys in sorted order, so the same claim
/// always produces the same bytes. Fails without side effects when the claim
/// is invalid or the payload would not fit into a memo instruction.
pub fn encode_memo(claim: &DebtClaim) -> Result<Vec<u8>, MemoError> {
    claim.validate()?;

    let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
    fields.insert("debt_amount", serde_json::to_value(&claim.debt_amount)?);
    fields.insert("due_date", Value::from(claim.due_date.as_str()));
    fields.insert("employee_wallet", Value::from(claim.employee_wallet.as_str()));
    fields.insert("employer_name", Value::from(claim.employer_name.as_str()));
    fields.insert("type", Value::from(MEMO_KIND));
    fields.insert("version", Value::from(MEMO_VERSION));

    let memo = serde_json::to_vec(&fields)?;
    if memo.len() > MAX_MEMO_BYTES {
        return Err(MemoError::TooLarge {
            size: memo.len(),
            limit: MAX_MEMO_BYTES,
        });
    }
    Ok(memo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn innovate_corp() -> DebtClaim {
        DebtClaim {
            employer_name: "Innovate Corp".to_string(),
            employee_wallet: "7iY1gV1cbkggftQS5G5YgSH8EH4n2U1f1a5fGzS6j4qP".to_string(),
            debt_amount: "5000 USD".into(),
            due_date: "2025-09-15".to_string(),
        }
    }

    #[test]
    fn test_encode_memo_innovate_corp() {
        let memo = encode_memo(&innovate_corp()).unwrap();
        assert!(memo.len() <= MAX_MEMO_BYTES);
        assert_eq!(
            String::from_utf8(memo).unwrap(),
            r#"{"debt_amount":"5000 USD","due_date":"2025-09-15","employee_wallet":"7iY1gV1cbkggftQS5G5YgSH8EH4n2U1f1a5fGzS6j4qP","employer_name":"Innovate Corp","type":"proof_of_debt","version":"1.0"}"#
        );
    }

    #[test]
    fn test_encode_memo_is_reproducible() {
        let claim = innovate_corp();
        let first = encode_memo(&claim).unwrap();
        let second = encode_memo(&claim.clone()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_memo_numeric_amount() {
        let claim: DebtClaim = serde_json::from_str(
            r#"{
                "employer_name": "Innovate Corp",
                "employee_wallet": "7iY1gV1cbkggftQS5G5YgSH8EH4n2U1f1a5fGzS6j4qP",
                "debt_amount": 1250,
                "due_date": "2025-09-15"
            }"#,
        )
        .unwrap();
        assert!(matches!(claim.debt_amount, DebtAmount::Number(_)));

        let memo = String::from_utf8(encode_memo(&claim).unwrap()).unwrap();
        assert!(memo.starts_with(r#"{"debt_amount":1250,"#));
    }

    #[test]
    fn test_debt_amount_from_str() {
        assert_eq!(
            "5000 USD".parse::<DebtAmount>().unwrap(),
            DebtAmount::Text("5000 USD".to_string())
        );
        assert!(matches!(
            "5000".parse::<DebtAmount>().unwrap(),
            DebtAmount::Number(_)
        ));
        assert!(matches!(
            "12.75".parse::<DebtAmount>().unwrap(),
            DebtAmount::Number(_)
        ));
    }

    #[test]
    fn test_debt_amount_conversions_agree() {
        for input in ["5000", "5000 USD", "12.75", " 42 "] {
            assert_eq!(DebtAmount::from(input), input.parse::<DebtAmount>().unwrap());
        }

        let mut from_cli = innovate_corp();
        from_cli.debt_amount = "5000".parse().unwrap();
        let mut from_code = innovate_corp();
        from_code.debt_amount = "5000".into();
        assert_eq!(encode_memo(&from_cli).unwrap(), encode_memo(&from_code).unwrap());
    }

    #[test]
    fn test_encode_memo_too_large() {
        let mut claim = innovate_corp();
        claim.employer_name = "A".repeat(MAX_MEMO_BYTES);

        match encode_memo(&claim) {
            Err(MemoError::TooLarge { size, limit }) => {
                assert!(size > limit);
                assert_eq!(limit, MAX_MEMO_BYTES);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_encode_memo_at_the_limit() {
        let mut claim = innovate_corp();
        let base = encode_memo(&claim).unwrap().len();
        claim.employer_name.push_str(&"x".repeat(MAX_MEMO_BYTES - base));
        assert_eq!(encode_memo(&claim).unwrap().len(), MAX_MEMO_BYTES);

        claim.employer_name.push('x');
        assert!(matches!(
            encode_memo(&claim),
            Err(MemoError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_wallet() {
        let mut claim = innovate_corp();
        claim.employee_wallet = "not-a-wallet".to_string();
        assert!(matches!(claim.validate(), Err(MemoError::InvalidWallet(_))));

        // Valid base58, wrong length.
        claim.employee_wallet = "3mJr7AoUXx2Wqd".to_string();
        assert!(matches!(claim.validate(), Err(MemoError::InvalidWallet(_))));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut claim = innovate_corp();
        claim.employer_name = "   ".to_string();
        assert!(matches!(claim.validate(), Err(MemoError::MissingEmployer)));

        let mut claim = innovate_corp();
        claim.due_date = String::new();
        assert!(matches!(claim.validate(), Err(MemoError::MissingDueDate)));
    }
}
