mod common;

use std::collections::HashSet;

use anyhow::Result;
use common::{AccountPair, balance_of, stats, test_service};
use ledgerbank::application::{AppError, ErrorKind, TransferParams, TransferTxResult};
use ledgerbank::storage::{ConstraintKind, StoreError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_concurrent_transfers_same_pair() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let AccountPair { a, b } = AccountPair::open(&service, 100, 50).await?;
    let before = stats(&service).await?;

    let n = 2;
    let amount = 10;
    let mut handles = Vec::new();
    for i in 0..n {
        let engine = service.engine().clone();
        let params = TransferParams::new(a.id, b.id, amount).with_label(format!("tx {}", i + 1));
        handles.push(tokio::spawn(async move { engine.execute(params).await }));
    }

    let mut results: Vec<TransferTxResult> = Vec::new();
    for handle in handles {
        results.push(handle.await??);
    }

    let mut seen_steps = HashSet::new();
    for result in &results {
        assert_eq!(result.transfer.from_account_id, a.id);
        assert_eq!(result.transfer.to_account_id, b.id);
        assert_eq!(result.transfer.amount, amount);

        assert_eq!(result.from_entry.account_id, a.id);
        assert_eq!(result.from_entry.amount, -amount);
        assert_eq!(result.to_entry.account_id, b.id);
        assert_eq!(result.to_entry.amount, amount);

        assert_eq!(result.from_account.id, a.id);
        assert_eq!(result.to_account.id, b.id);

        // Each transaction observes its own post-update balances: after the
        // k-th commit both accounts have moved by exactly k * amount.
        let debited = a.balance - result.from_account.balance;
        let credited = result.to_account.balance - b.balance;
        assert_eq!(debited, credited);
        assert_eq!(debited % amount, 0);
        let k = debited / amount;
        assert!((1..=n).contains(&k));
        assert!(seen_steps.insert(k), "two transfers observed the same balance");

        service.get_transfer(result.transfer.id).await?;
        service.get_entry(result.from_entry.id).await?;
        service.get_entry(result.to_entry.id).await?;
    }

    assert_eq!(balance_of(&service, a.id).await?, 80);
    assert_eq!(balance_of(&service, b.id).await?, 70);

    let after = stats(&service).await?;
    assert_eq!(after.transfer_count - before.transfer_count, 2);
    assert_eq!(after.entry_count - before.entry_count, 4);

    let mut amounts: Vec<i64> = results
        .iter()
        .flat_map(|r| [r.from_entry.amount, r.to_entry.amount])
        .collect();
    amounts.sort();
    assert_eq!(amounts, vec![-10, -10, 10, 10]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_lose_no_updates() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let AccountPair { a, b } = AccountPair::open(&service, 10_000, 500).await?;

    let n = 10;
    let amount = 25;
    let (from, to) = (a.id, b.id);
    let mut handles = Vec::new();
    for _ in 0..n {
        let engine = service.engine().clone();
        handles.push(tokio::spawn(async move {
            engine.execute(TransferParams::new(from, to, amount)).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(balance_of(&service, a.id).await?, 10_000 - n * amount);
    assert_eq!(balance_of(&service, b.id).await?, 500 + n * amount);
    assert!(service.check_integrity().await?.is_healthy());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_direction_transfers_do_not_deadlock() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let AccountPair { a, b } = AccountPair::open(&service, 1_000, 1_000).await?;

    let n = 10;
    let mut expected_a = a.balance;
    let mut expected_b = b.balance;
    let mut handles = Vec::new();
    for i in 0..n {
        let amount = (i + 1) * 10;
        let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
        if from == a.id {
            expected_a -= amount;
            expected_b += amount;
        } else {
            expected_a += amount;
            expected_b -= amount;
        }

        let engine = service.engine().clone();
        handles.push(tokio::spawn(async move {
            engine.execute(TransferParams::new(from, to, amount)).await
        }));
    }

    for handle in handles {
        let result = handle.await?;
        assert!(result.is_ok(), "transfer failed: {:?}", result.err());
    }

    assert_eq!(balance_of(&service, a.id).await?, expected_a);
    assert_eq!(balance_of(&service, b.id).await?, expected_b);
    assert_eq!(expected_a + expected_b, 2_000);

    let ledger = stats(&service).await?;
    assert_eq!(ledger.transfer_count, n);
    assert_eq!(ledger.balance_total, ledger.entry_total);

    Ok(())
}

#[tokio::test]
async fn test_result_follows_request_direction() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let AccountPair { a, b } = AccountPair::open(&service, 100, 50).await?;
    assert!(a.id < b.id);

    // Larger id pays the smaller one, so the credit is applied first.
    let result = service
        .engine()
        .execute(TransferParams::new(b.id, a.id, 30))
        .await?;

    assert_eq!(result.from_account.id, b.id);
    assert_eq!(result.from_account.balance, 20);
    assert_eq!(result.to_account.id, a.id);
    assert_eq!(result.to_account.balance, 130);
    assert_eq!(result.from_entry.account_id, b.id);
    assert_eq!(result.from_entry.amount, -30);
    assert_eq!(result.to_entry.account_id, a.id);
    assert_eq!(result.to_entry.amount, 30);

    Ok(())
}

#[tokio::test]
async fn test_transfer_to_missing_account_writes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let AccountPair { a, .. } = AccountPair::open(&service, 100, 50).await?;
    let before = stats(&service).await?;

    let err = service
        .engine()
        .execute(TransferParams::new(a.id, 9_999, 10))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Store(StoreError::Constraint {
            kind: ConstraintKind::ForeignKey,
            ..
        })
    ));
    assert_eq!(err.kind(), ErrorKind::Constraint(ConstraintKind::ForeignKey));

    assert_eq!(stats(&service).await?, before);
    assert_eq!(balance_of(&service, a.id).await?, 100);

    Ok(())
}

#[tokio::test]
async fn test_self_transfer_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let AccountPair { a, .. } = AccountPair::open(&service, 100, 50).await?;
    let before = stats(&service).await?;

    let err = service
        .engine()
        .execute(TransferParams::new(a.id, a.id, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SameAccount(id) if id == a.id));
    assert_eq!(stats(&service).await?, before);

    Ok(())
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let AccountPair { a, b } = AccountPair::open(&service, 100, 50).await?;
    let before = stats(&service).await?;

    for amount in [0, -10] {
        let err = service
            .engine()
            .execute(TransferParams::new(a.id, b.id, amount))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));
    }
    assert_eq!(stats(&service).await?, before);

    Ok(())
}

#[tokio::test]
async fn test_cancelled_transfer_rolls_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let AccountPair { a, b } = AccountPair::open(&service, 100, 50).await?;
    let before = stats(&service).await?;

    let err = service
        .engine()
        .execute_until(TransferParams::new(a.id, b.id, 10), std::future::ready(()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Store(StoreError::Cancelled)));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(stats(&service).await?, before);
    assert_eq!(balance_of(&service, a.id).await?, 100);
    assert_eq!(balance_of(&service, b.id).await?, 50);

    // The engine is still usable afterwards.
    service
        .engine()
        .execute(TransferParams::new(a.id, b.id, 10))
        .await?;
    assert_eq!(balance_of(&service, a.id).await?, 90);

    Ok(())
}
