use crate::{
    entities::{review, Product, Review},
    errors::ServiceError,
    pagination::{PageParams, Paginated},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Product reviews: submission plus the per-product paginated feed.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewInput {
    pub customer_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Submits a review for a product. One review per customer per product;
    /// resubmitting replaces the earlier rating and comment.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn submit_review(
        &self,
        product_id: Uuid,
        input: SubmitReviewInput,
    ) -> Result<review::Model, ServiceError> {
        input.validate()?;

        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::CustomerId.eq(input.customer_id))
            .one(&*self.db)
            .await?;

        let saved = if let Some(existing) = existing {
            let mut active: review::ActiveModel = existing.into();
            active.rating = Set(input.rating);
            active.comment = Set(input.comment);
            active.created_at = Set(Utc::now());
            active.update(&*self.db).await?
        } else {
            let model = review::ActiveModel {
                id: Set(Uuid::new_v4()),
                customer_id: Set(input.customer_id),
                product_id: Set(product_id),
                rating: Set(input.rating),
                comment: Set(input.comment),
                created_at: Set(Utc::now()),
            };
            model.insert(&*self.db).await?
        };

        info!(product_id = %product_id, rating = saved.rating, "Review saved");
        Ok(saved)
    }

    /// Lists a product's reviews, newest first.
    #[instrument(skip(self))]
    pub async fn list_reviews(
        &self,
        product_id: Uuid,
        page: PageParams,
    ) -> Result<Paginated<review::Model>, ServiceError> {
        let paginator = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .paginate(&*self.db, page.per_page);

        let total = paginator.num_items().await?;
        let reviews = paginator.fetch_page(page.zero_based()).await?;

        Ok(Paginated::new(reviews, total, page))
    }

    /// Average rating across a product's reviews, or `None` with no reviews.
    pub async fn average_rating(&self, product_id: Uuid) -> Result<Option<f64>, ServiceError> {
        let reviews = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?;

        if reviews.is_empty() {
            return Ok(None);
        }

        let sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
        Ok(Some(sum as f64 / reviews.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(rating: i32) -> SubmitReviewInput {
        SubmitReviewInput {
            customer_id: Uuid::new_v4(),
            rating,
            comment: Some("Fresh and crisp".to_string()),
        }
    }

    #[test]
    fn rating_must_be_between_one_and_five() {
        assert!(input(0).validate().is_err());
        assert!(input(6).validate().is_err());
        for rating in 1..=5 {
            assert!(input(rating).validate().is_ok(), "rating {}", rating);
        }
    }

    #[test]
    fn comment_is_optional() {
        let mut i = input(4);
        i.comment = None;
        assert!(i.validate().is_ok());
    }
}
