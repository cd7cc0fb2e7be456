use std::collections::HashMap;

use anyhow::Context;
use sqlx::{FromRow, PgPool, Postgres, Transaction as SqlTransaction};
use time::OffsetDateTime;
use ulid::Ulid;
use uuid::Uuid;

use super::model::{Portfolio, Transaction, TransactionKind};

#[derive(Debug, FromRow)]
struct PortfolioRow {
    id: Uuid,
    user_id: Option<Uuid>,
    name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    portfolio_id: Uuid,
    coin_id: String,
    kind: String,
    quantity: f64,
    price: f64,
    executed_at: OffsetDateTime,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = anyhow::Error;

    fn try_from(r: TransactionRow) -> anyhow::Result<Self> {
        let kind = TransactionKind::parse(&r.kind)
            .with_context(|| format!("unknown transaction kind {:?} on {}", r.kind, r.id))?;
        Ok(Self {
            id: Ulid::from(r.id),
            coin_id: r.coin_id,
            kind,
            quantity: r.quantity,
            price: r.price,
            executed_at: r.executed_at,
        })
    }
}

/// Portfolios of the given users with their transactions, keyed by owner.
/// Portfolios come back in creation order, transactions in execution order.
pub async fn list_for_users(
    db: &PgPool,
    user_ids: &[Ulid],
) -> anyhow::Result<HashMap<Ulid, Vec<Portfolio>>> {
    let mut out: HashMap<Ulid, Vec<Portfolio>> = HashMap::new();
    if user_ids.is_empty() {
        return Ok(out);
    }
    let ids: Vec<Uuid> = user_ids.iter().copied().map(Uuid::from).collect();

    let portfolios = sqlx::query_as::<_, PortfolioRow>(
        r#"
        SELECT id, user_id, name, created_at, updated_at
          FROM portfolios
         WHERE user_id = ANY($1)
         ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(db)
    .await
    .context("list portfolios by users")?;

    let portfolio_ids: Vec<Uuid> = portfolios.iter().map(|p| p.id).collect();
    let rows = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT id, portfolio_id, coin_id, kind, quantity, price, executed_at
          FROM transactions
         WHERE portfolio_id = ANY($1)
         ORDER BY executed_at ASC, id ASC
        "#,
    )
    .bind(&portfolio_ids)
    .fetch_all(db)
    .await
    .context("list transactions by portfolios")?;

    let mut by_portfolio: HashMap<Uuid, Vec<Transaction>> = HashMap::new();
    for row in rows {
        let portfolio_id = row.portfolio_id;
        by_portfolio
            .entry(portfolio_id)
            .or_default()
            .push(Transaction::try_from(row)?);
    }

    for p in portfolios {
        let Some(owner) = p.user_id.map(Ulid::from) else {
            continue;
        };
        out.entry(owner).or_default().push(Portfolio {
            id: Ulid::from(p.id),
            name: p.name,
            owner: Some(owner),
            transactions: by_portfolio.remove(&p.id).unwrap_or_default(),
            created_at: p.created_at,
            updated_at: p.updated_at,
        });
    }
    Ok(out)
}

/// Persist a portfolio and its transactions within a transaction.
pub async fn insert_tx(
    tx: &mut SqlTransaction<'_, Postgres>,
    portfolio: &Portfolio,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO portfolios (id, user_id, name, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::from(portfolio.id))
    .bind(portfolio.owner.map(Uuid::from))
    .bind(&portfolio.name)
    .bind(portfolio.created_at)
    .bind(portfolio.updated_at)
    .execute(&mut **tx)
    .await
    .context("insert portfolio")?;

    for t in &portfolio.transactions {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, portfolio_id, coin_id, kind, quantity, price, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(t.id))
        .bind(Uuid::from(portfolio.id))
        .bind(&t.coin_id)
        .bind(t.kind.as_str())
        .bind(t.quantity)
        .bind(t.price)
        .bind(t.executed_at)
        .execute(&mut **tx)
        .await
        .context("insert transaction")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_row_with_unknown_kind_is_rejected() {
        let row = TransactionRow {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            coin_id: "bitcoin".into(),
            kind: "stake".into(),
            quantity: 1.0,
            price: 10.0,
            executed_at: OffsetDateTime::now_utc(),
        };
        let err = Transaction::try_from(row).unwrap_err();
        assert!(err.to_string().contains("unknown transaction kind"));
    }

    #[test]
    fn transaction_row_maps_ids_losslessly() {
        let id = Ulid::new();
        let row = TransactionRow {
            id: Uuid::from(id),
            portfolio_id: Uuid::new_v4(),
            coin_id: "ethereum".into(),
            kind: "sell".into(),
            quantity: 0.5,
            price: 3000.0,
            executed_at: OffsetDateTime::now_utc(),
        };
        let t = Transaction::try_from(row).unwrap();
        assert_eq!(t.id, id);
        assert_eq!(t.kind, TransactionKind::Sell);
    }
}
