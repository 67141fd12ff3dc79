use crate::{
    entities::{
        coupon::{self, CouponStatus, DiscountType},
        Coupon, CouponModel,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A coupon that passed validation for a specific subtotal, with the derived
/// discount amount. The amount is recomputed from the live subtotal whenever
/// it is applied, never carried over from an earlier quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
}

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Validates a coupon code against the given subtotal and returns the
    /// coupon with its derived discount amount.
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<ValidatedCoupon, ServiceError> {
        let coupon = self.find_by_code(code).await?.ok_or_else(|| {
            ServiceError::CouponRejected(format!("Coupon {} not found", code))
        })?;

        let now = Utc::now();

        if coupon.status != CouponStatus::Active {
            return Err(ServiceError::CouponRejected(format!(
                "Coupon {} is disabled",
                code
            )));
        }
        if now < coupon.starts_at {
            return Err(ServiceError::CouponRejected(format!(
                "Coupon {} is not active yet",
                code
            )));
        }
        if now > coupon.expires_at {
            return Err(ServiceError::CouponRejected(format!(
                "Coupon {} has expired",
                code
            )));
        }
        if let Some(limit) = coupon.usage_limit {
            if coupon.usage_count >= limit {
                warn!("Coupon {} has reached its usage limit", code);
                return Err(ServiceError::CouponRejected(format!(
                    "Coupon {} has reached its usage limit",
                    code
                )));
            }
        }
        if let Some(min_amount) = coupon.min_order_amount {
            if subtotal < min_amount {
                debug!(
                    "Subtotal {} is below minimum order amount {}",
                    subtotal, min_amount
                );
                return Err(ServiceError::CouponRejected(format!(
                    "Order must be at least {} to use coupon {}",
                    min_amount, code
                )));
            }
        }

        if coupon.discount_value < Decimal::ZERO {
            return Err(ServiceError::CouponRejected(format!(
                "Coupon {} has an invalid discount value",
                code
            )));
        }
        if coupon.discount_type == DiscountType::Percentage
            && coupon.discount_value > Decimal::from(100)
        {
            return Err(ServiceError::CouponRejected(format!(
                "Coupon {} has an invalid percentage",
                code
            )));
        }

        let discount_amount = discount_for(subtotal, coupon.discount_type, coupon.discount_value);

        Ok(ValidatedCoupon {
            code: coupon.code,
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            discount_amount,
        })
    }

    /// Increments a coupon's usage count. Called after a successful order;
    /// callers treat failure as non-fatal and only log it.
    #[instrument(skip(self))]
    pub async fn track_usage(&self, code: &str) -> Result<(), ServiceError> {
        let coupon = self
            .find_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))?;

        let usage_count = coupon.usage_count;
        let mut active: coupon::ActiveModel = coupon.into();
        active.usage_count = Set(usage_count + 1);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<CouponModel>, ServiceError> {
        Ok(Coupon::find()
            .filter(coupon::Column::Code.eq(code))
            .one(&*self.db)
            .await?)
    }
}

/// Discount amount for a subtotal.
///
/// Percentage coupons take `subtotal * value / 100`; fixed coupons take the
/// lesser of the coupon value and the subtotal, so the discount can never
/// exceed what is being paid. The result is rounded to 2 decimal places
/// (half away from zero).
pub fn discount_for(subtotal: Decimal, discount_type: DiscountType, value: Decimal) -> Decimal {
    let raw = match discount_type {
        DiscountType::Percentage => subtotal * value / Decimal::from(100),
        DiscountType::Fixed => value.min(subtotal),
    };

    raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
