use std::str::FromStr;

use anyhow::{Result, anyhow};

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::{
    pubkey::Pubkey, signature::Keypair, signer::Signer as SolanaSigner, transaction::Transaction,
};
use tracing::debug;

/// Address of the SPL memo program (v2).
pub const MEMO_PROGRAM_ADDRESS: &str = "MemoSq4gqABAXKb96qnH8TysNcVnuvMvKdkdcMAwn9B";

pub const MEMO_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    5, 74, 83, 90, 153, 41, 33, 6, 77, 36, 232, 113, 96, 218, 56, 124, 124, 53, 181, 221, 126,
    242, 185, 116, 31, 251, 166, 241, 51, 142, 115, 110,
]);

pub fn parse_program_address(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address)
        .map_err(|e| anyhow!("Failed to parse program address {}: {}", address, e))
}

/// Builds memo transactions for a fixed memo program.
pub struct MemoTransaction {
    memo_program: Pubkey,
}

impl MemoTransaction {
    pub fn new(memo_program: Pubkey) -> Self {
        Self { memo_program }
    }

    pub fn memo_program(&self) -> &Pubkey {
        &self.memo_program
    }

    /// The memo program takes the payload as raw instruction data and needs no accounts.
    pub fn instruction(&self, memo: &[u8]) -> Instruction {
        Instruction {
            program_id: self.memo_program,
            accounts: vec![],
            data: memo.to_vec(),
        }
    }

    /// Signs a single-instruction transaction paid for by `payer`.
    ///
    /// The transaction is only valid while `recent_blockhash` is, so callers
    /// should fetch the hash right before calling this.
    pub fn prepare(&self, payer: &Keypair, memo: &[u8], recent_blockhash: Hash) -> Transaction {
        let instructions = [self.instruction(memo)];
        let tx = Transaction::new_signed_with_payer(
            &instructions,
            Some(&payer.pubkey()),
            &[payer],
            recent_blockhash,
        );
        debug!(
            "Prepared memo transaction of {} bytes for payer {}",
            memo.len(),
            payer.pubkey()
        );
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_program_address() {
        let memo_program = parse_program_address(MEMO_PROGRAM_ADDRESS);
        assert!(memo_program.is_ok());
        assert_eq!(memo_program.unwrap(), MEMO_PROGRAM_ID);
        assert_eq!(MEMO_PROGRAM_ID.to_string(), MEMO_PROGRAM_ADDRESS);

        assert!(parse_program_address("not a program").is_err());
    }

    #[test]
    fn test_instruction_has_no_accounts() {
        let builder = MemoTransaction::new(MEMO_PROGRAM_ID);
        let ix = builder.instruction(b"{\"a\":1}");
        assert_eq!(ix.program_id, *builder.memo_program());
        assert!(ix.accounts.is_empty());
        assert_eq!(ix.data, b"{\"a\":1}".to_vec());
    }

    #[test]
    fn test_prepare_signs_with_payer() {
        let builder = MemoTransaction::new(MEMO_PROGRAM_ID);
        let payer = Keypair::new();
        let blockhash = Hash::new_unique();
        let memo = b"proof of debt";

        let tx = builder.prepare(&payer, memo, blockhash);

        assert!(tx.is_signed());
        assert!(tx.verify().is_ok());
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.message.recent_blockhash, blockhash);
        assert_eq!(tx.message.account_keys[0], payer.pubkey());
        assert_eq!(tx.message.instructions.len(), 1);

        let ix = &tx.message.instructions[0];
        assert!(ix.accounts.is_empty());
        assert_eq!(ix.data, memo.to_vec());
        assert_eq!(
            tx.message.account_keys[ix.program_id_index as usize],
            *builder.memo_program()
        );
    }

    #[test]
    fn test_prepare_fresh_blockhash_changes_signature() {
        let builder = MemoTransaction::new(MEMO_PROGRAM_ID);
        let payer = Keypair::new();

        let first = builder.prepare(&payer, b"memo", Hash::new_unique());
        let second = builder.prepare(&payer, b"memo", Hash::new_unique());
        assert_ne!(first.signatures[0], second.signatures[0]);
    }
}
