use crate::{
    entities::{address, Address},
    errors::ServiceError,
    pagination::{PageParams, Paginated},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Saved delivery addresses. A customer has at most one default address;
/// setting a new default clears the previous one in the same transaction.
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveAddressInput {
    pub label: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(equal = 2))]
    pub country_code: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates an address for a customer. The first saved address becomes the
    /// default regardless of the flag, so checkout always has one to offer.
    #[instrument(skip(self, input))]
    pub async fn create_address(
        &self,
        customer_id: Uuid,
        input: SaveAddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let existing = Address::find()
            .filter(address::Column::CustomerId.eq(customer_id))
            .count(&txn)
            .await?;
        let is_default = input.is_default || existing == 0;

        if is_default {
            self.clear_default(&txn, customer_id).await?;
        }

        let now = Utc::now();
        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            label: Set(input.label),
            line1: Set(input.line1),
            line2: Set(input.line2),
            city: Set(input.city),
            state: Set(input.state),
            postal_code: Set(input.postal_code),
            country_code: Set(input.country_code.to_uppercase()),
            phone: Set(input.phone),
            is_default: Set(is_default),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&txn).await?;

        txn.commit().await?;

        info!(customer_id = %customer_id, address_id = %created.id, "Address saved");
        Ok(created)
    }

    /// Updates an address in place.
    #[instrument(skip(self, input))]
    pub async fn update_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
        input: SaveAddressInput,
    ) -> Result<address::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let existing = self.find_owned(&txn, customer_id, address_id).await?;

        if input.is_default && !existing.is_default {
            self.clear_default(&txn, customer_id).await?;
        }

        let mut active: address::ActiveModel = existing.into();
        active.label = Set(input.label);
        active.line1 = Set(input.line1);
        active.line2 = Set(input.line2);
        active.city = Set(input.city);
        active.state = Set(input.state);
        active.postal_code = Set(input.postal_code);
        active.country_code = Set(input.country_code.to_uppercase());
        active.phone = Set(input.phone);
        active.is_default = Set(input.is_default);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Marks one address as the default, clearing any previous default.
    #[instrument(skip(self))]
    pub async fn set_default(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<address::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = self.find_owned(&txn, customer_id, address_id).await?;
        self.clear_default(&txn, customer_id).await?;

        let mut active: address::ActiveModel = existing.into();
        active.is_default = Set(true);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Deletes an address.
    #[instrument(skip(self))]
    pub async fn delete_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = self.find_owned(&*self.db, customer_id, address_id).await?;
        Address::delete_by_id(existing.id).exec(&*self.db).await?;
        Ok(())
    }

    /// Lists a customer's addresses, default first, then newest first.
    #[instrument(skip(self))]
    pub async fn list_addresses(
        &self,
        customer_id: Uuid,
        page: PageParams,
    ) -> Result<Paginated<address::Model>, ServiceError> {
        let paginator = Address::find()
            .filter(address::Column::CustomerId.eq(customer_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .paginate(&*self.db, page.per_page);

        let total = paginator.num_items().await?;
        let addresses = paginator.fetch_page(page.zero_based()).await?;

        Ok(Paginated::new(addresses, total, page))
    }

    async fn find_owned(
        &self,
        conn: &impl sea_orm::ConnectionTrait,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<address::Model, ServiceError> {
        let address = Address::find_by_id(address_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        if address.customer_id != customer_id {
            return Err(ServiceError::NotFound(format!(
                "Address {} not found",
                address_id
            )));
        }

        Ok(address)
    }

    async fn clear_default(
        &self,
        conn: &impl sea_orm::ConnectionTrait,
        customer_id: Uuid,
    ) -> Result<(), ServiceError> {
        Address::update_many()
            .col_expr(address::Column::IsDefault, Expr::value(false))
            .filter(address::Column::CustomerId.eq(customer_id))
            .filter(address::Column::IsDefault.eq(true))
            .exec(conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> SaveAddressInput {
        SaveAddressInput {
            label: Some("Home".to_string()),
            line1: "12 Wattle St".to_string(),
            line2: None,
            city: "Melbourne".to_string(),
            state: "VIC".to_string(),
            postal_code: "3000".to_string(),
            country_code: "AU".to_string(),
            phone: None,
            is_default: false,
        }
    }

    #[test]
    fn valid_address_passes_validation() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn country_code_must_be_two_letters() {
        let mut input = valid_input();
        input.country_code = "AUS".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn line1_must_not_be_empty() {
        let mut input = valid_input();
        input.line1 = String::new();
        assert!(input.validate().is_err());
    }

    #[test]
    fn is_default_defaults_to_false_in_payload() {
        let json = r#"{
            "line1": "12 Wattle St",
            "city": "Melbourne",
            "state": "VIC",
            "postal_code": "3000",
            "country_code": "AU"
        }"#;
        let input: SaveAddressInput = serde_json::from_str(json).expect("deserializes");
        assert!(!input.is_default);
    }
}
