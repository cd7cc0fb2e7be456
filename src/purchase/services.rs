use tracing::{debug, instrument};

use crate::{
    auth::voter::{deny_access_unless_granted, Attribute, Principal},
    coins::{Coin, PriceListClient},
    error::AppError,
    users::model::User,
};

/// Number of coins offered on the purchase page.
pub const PURCHASE_LISTING_LIMIT: usize = 25;

/// Coins the caller may buy: the first entries of the price list, in the
/// provider's order. Access is checked before the price list is contacted.
#[instrument(skip_all, fields(user_id = %principal.id))]
pub async fn purchasable_coins(
    client: &dyn PriceListClient,
    principal: &Principal,
    subject: &User,
) -> Result<Vec<Coin>, AppError> {
    deny_access_unless_granted(Attribute::IsVerifiedCheck, principal, Some(subject))?;

    let mut coins = client.list().await?;
    let available = coins.len();
    coins.truncate(PURCHASE_LISTING_LIMIT);
    debug!(available, listed = coins.len(), "purchase listing prepared");
    Ok(coins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fake::FakePriceList;

    fn verified_user() -> User {
        let mut u = User::new("alice@example.com", "h");
        u.set_is_verified(true);
        u
    }

    #[tokio::test]
    async fn lists_first_25_in_client_order() {
        let client = FakePriceList::with_coins(30);
        let u = verified_user();
        let coins = purchasable_coins(&client, &u.principal(), &u).await.unwrap();

        assert_eq!(coins.len(), PURCHASE_LISTING_LIMIT);
        assert_eq!(coins, client.coins[..PURCHASE_LISTING_LIMIT].to_vec());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn short_lists_are_passed_through() {
        let client = FakePriceList::with_coins(3);
        let u = verified_user();
        let coins = purchasable_coins(&client, &u.principal(), &u).await.unwrap();
        assert_eq!(coins.len(), 3);
    }

    #[tokio::test]
    async fn every_call_refetches() {
        let client = FakePriceList::with_coins(5);
        let u = verified_user();
        purchasable_coins(&client, &u.principal(), &u).await.unwrap();
        purchasable_coins(&client, &u.principal(), &u).await.unwrap();
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn unverified_user_is_denied_without_calling_client() {
        let client = FakePriceList::with_coins(30);
        let u = User::new("bob@example.com", "h");
        let err = purchasable_coins(&client, &u.principal(), &u).await.unwrap_err();

        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn another_users_subject_is_denied() {
        let client = FakePriceList::with_coins(30);
        let caller = verified_user();
        let other = {
            let mut u = User::new("carol@example.com", "h");
            u.set_is_verified(true);
            u
        };
        let err = purchasable_coins(&client, &caller.principal(), &other)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn client_failure_propagates() {
        let client = FakePriceList::failing();
        let u = verified_user();
        let err = purchasable_coins(&client, &u.principal(), &u).await.unwrap_err();
        assert!(matches!(err, AppError::PriceList(_)));
    }
}
