//! Synthetic transfer workload
//!
//! Accounts hold balances in an [`MvMemory`]. A transfer reads both balances
//! at its position in the batch and always writes both back, so its write set
//! does not change between incarnations.

use occam_scheduler::{AccessTracked, ExecuteError, MvMemory, RWSet, StateKey, TxExecutor, Version};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Move `amount` from one account to another
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: u32,
    pub to: u32,
    pub amount: u64,
}

/// Result of one transfer
#[derive(Clone, Debug, PartialEq)]
pub struct Receipt {
    /// False when the sender could not cover the amount
    pub success: bool,
    /// Sender balance after the transfer
    pub from_balance: u64,
    accesses: RWSet,
}

impl AccessTracked for Receipt {
    fn rw_set(&self) -> &RWSet {
        &self.accesses
    }
}

/// State key of an account balance
pub fn account_key(id: u32) -> StateKey {
    StateKey::from(format!("account/{}", id))
}

/// Initial state: every account funded with `balance`
pub fn genesis(accounts: u32, balance: u64) -> HashMap<StateKey, u64> {
    (0..accounts).map(|id| (account_key(id), balance)).collect()
}

/// Generate a deterministic batch of transfers between distinct accounts
pub fn generate(transactions: usize, accounts: u32, max_amount: u64, seed: u64) -> Vec<Transfer> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..transactions)
        .map(|_| {
            let from = rng.gen_range(0..accounts.max(1));
            let mut to = rng.gen_range(0..accounts.max(1));
            if to == from && accounts > 1 {
                to = (to + 1) % accounts;
            }
            Transfer {
                from,
                to,
                amount: rng.gen_range(1..=max_amount.max(1)),
            }
        })
        .collect()
}

/// Executes transfers against multi-version balances
#[derive(Clone, Copy, Debug)]
pub struct TransferExecutor {
    accounts: u32,
}

impl TransferExecutor {
    /// Executor for a ledger of `accounts` accounts
    pub fn new(accounts: u32) -> Self {
        Self { accounts }
    }
}

impl TxExecutor for TransferExecutor {
    type Context = MvMemory<u64>;
    type Request = Transfer;
    type Response = Receipt;
    type Error = String;

    fn execute(
        &self,
        memory: &MvMemory<u64>,
        tx: &Transfer,
        version: Version,
    ) -> Result<Receipt, ExecuteError<String>> {
        if tx.from >= self.accounts || tx.to >= self.accounts {
            return Err(ExecuteError::Failed(format!(
                "unknown account in transfer {} -> {}",
                tx.from, tx.to
            )));
        }

        let (from, to) = (account_key(tx.from), account_key(tx.to));
        let mut accesses = RWSet::new();
        accesses.record_read(from.clone());
        accesses.record_read(to.clone());

        let from_balance = memory.read(&from, version.index).into_value().unwrap_or(0);
        let to_balance = memory.read(&to, version.index).into_value().unwrap_or(0);
        let success = tx.from != tx.to && from_balance >= tx.amount;
        let (new_from, new_to) = if success {
            (from_balance - tx.amount, to_balance + tx.amount)
        } else {
            (from_balance, to_balance)
        };

        memory.write(to.clone(), version, new_to);
        memory.write(from.clone(), version, new_from);
        accesses.record_write(to);
        accesses.record_write(from);

        Ok(Receipt {
            success,
            from_balance: new_from,
            accesses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(accounts: u32) -> MvMemory<u64> {
        MvMemory::with_base(genesis(accounts, 100))
    }

    // ==================== Generator Tests ====================

    #[test]
    fn test_generate_deterministic() {
        assert_eq!(generate(50, 8, 100, 7), generate(50, 8, 100, 7));
        assert_ne!(generate(50, 8, 100, 7), generate(50, 8, 100, 8));
    }

    #[test]
    fn test_generate_bounds() {
        let transfers = generate(200, 5, 30, 1);
        assert_eq!(transfers.len(), 200);
        for t in &transfers {
            assert!(t.from < 5 && t.to < 5);
            assert_ne!(t.from, t.to);
            assert!((1..=30).contains(&t.amount));
        }
    }

    // ==================== Executor Tests ====================

    #[test]
    fn test_transfer_moves_balance() {
        let mem = memory(2);
        let exec = TransferExecutor::new(2);
        let tx = Transfer { from: 0, to: 1, amount: 40 };

        let receipt = exec.execute(&mem, &tx, Version::new(0, 0)).unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.from_balance, 60);
        assert_eq!(mem.read(&account_key(1), 1).into_value(), Some(140));
        assert!(receipt.rw_set().writes_key(&account_key(0)));
        assert!(receipt.rw_set().reads_key(&account_key(1)));
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mem = memory(2);
        let exec = TransferExecutor::new(2);
        let tx = Transfer { from: 0, to: 1, amount: 101 };

        let receipt = exec.execute(&mem, &tx, Version::new(0, 0)).unwrap();

        assert!(!receipt.success);
        assert_eq!(receipt.from_balance, 100);
        // write set stays the same as for a successful transfer
        assert!(receipt.rw_set().writes_key(&account_key(0)));
        assert!(receipt.rw_set().writes_key(&account_key(1)));
    }

    #[test]
    fn test_transfer_sees_lower_writes() {
        let mem = memory(3);
        let exec = TransferExecutor::new(3);
        let first = Transfer { from: 0, to: 1, amount: 100 };
        exec.execute(&mem, &first, Version::new(0, 0)).unwrap();

        let second = Transfer { from: 1, to: 2, amount: 150 };
        let receipt = exec.execute(&mem, &second, Version::new(1, 0)).unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.from_balance, 50);
    }

    #[test]
    fn test_transfer_unknown_account_fails() {
        let exec = TransferExecutor::new(2);
        let tx = Transfer { from: 0, to: 9, amount: 1 };
        let result = exec.execute(&memory(2), &tx, Version::new(0, 0));
        assert!(matches!(result, Err(ExecuteError::Failed(_))));
    }
}
