use crate::{
    entities::{product, Product, ProductModel},
    errors::ServiceError,
    pagination::{PageParams, Paginated},
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Catalog read side: product lookups and the browsable listing. Catalog
/// writes happen through back-office tooling, not this API.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Retrieves a product by id. Archived products still resolve so old
    /// order lines can link back to them.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Lists active products, optionally narrowed by category or a name
    /// substring search.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: PageParams,
    ) -> Result<Paginated<ProductModel>, ServiceError> {
        let mut query = Product::find()
            .filter(product::Column::Status.eq(product::ProductStatus::Active))
            .order_by_asc(product::Column::Name);

        if let Some(category) = &filter.category {
            query = query.filter(product::Column::Category.eq(category.as_str()));
        }
        if let Some(search) = &filter.search {
            if !search.trim().is_empty() {
                query = query.filter(product::Column::Name.contains(search.trim()));
            }
        }

        let paginator = query.paginate(&*self.db, page.per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.zero_based()).await?;

        Ok(Paginated::new(products, total, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_deserializes_from_query_fragment() {
        let filter: ProductFilter =
            serde_json::from_str(r#"{"category": "produce"}"#).expect("deserializes");
        assert_eq!(filter.category.as_deref(), Some("produce"));
        assert!(filter.search.is_none());
    }

    #[test]
    fn filter_defaults_to_unfiltered() {
        let filter = ProductFilter::default();
        assert!(filter.category.is_none());
        assert!(filter.search.is_none());
    }
}
