//! Products and the sales recorded against them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

use super::{StoreError, parse_id};
use crate::auth::{Claims, ROLE_ADMIN};

/// Largest cost, quantity or payment a client may send. Keep in step with the
/// `max` bounds on the input types below.
pub const MAX_AMOUNT: i64 = 1_000_000_000;

/// An item that can be sold, with its sales totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    /// Subject of the user who created it.
    pub user_id: String,
    pub name: String,
    pub cost: i64,
    pub quantity: i64,
    pub sold: i64,
    pub revenue: i64,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// What clients send to create a product.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewProduct {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[validate(range(min = 0, max = 1000000000))]
    pub cost: i64,
    #[validate(range(min = 1, max = 1000000000))]
    pub quantity: i64,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, cost: i64, quantity: i64) -> Self {
        Self { name: name.into(), cost, quantity }
    }
}

/// A partial update. Absent fields keep their value.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 1, message = "cannot be blank"))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 1000000000))]
    pub cost: Option<i64>,
    #[validate(range(min = 1, max = 1000000000))]
    pub quantity: Option<i64>,
}

/// One sale of some quantity of a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub paid: i64,
    pub date_created: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewSale {
    #[validate(range(min = 1, max = 1000000000))]
    pub quantity: i64,
    #[validate(range(min = 0, max = 1000000000))]
    pub paid: i64,
}

#[derive(Default)]
struct Catalogue {
    products: HashMap<Uuid, Product>,
    sales: HashMap<Uuid, Vec<Sale>>,
}

impl Catalogue {
    /// `product` with `sold` and `revenue` filled in from its sales. Totals
    /// saturate at `i64::MAX`.
    fn with_totals(&self, product: &Product) -> Product {
        let sales = self.sales.get(&product.id).map(Vec::as_slice).unwrap_or_default();
        Product {
            sold: sales.iter().fold(0_i64, |sum, s| sum.saturating_add(s.quantity)),
            revenue: sales.iter().fold(0_i64, |sum, s| sum.saturating_add(s.paid)),
            ..product.clone()
        }
    }
}

/// The product catalogue.
#[derive(Default)]
pub struct Products {
    inner: RwLock<Catalogue>,
}

impl Products {
    /// Every product, oldest first.
    pub async fn list(&self) -> Vec<Product> {
        let catalogue = self.inner.read().await;
        let mut list: Vec<Product> = catalogue.products.values().map(|p| catalogue.with_totals(p)).collect();
        list.sort_by(|a, b| a.date_created.cmp(&b.date_created).then(a.id.cmp(&b.id)));
        list
    }

    pub async fn retrieve(&self, id: &str) -> Result<Product, StoreError> {
        let id = parse_id(id)?;
        let catalogue = self.inner.read().await;
        catalogue
            .products
            .get(&id)
            .map(|p| catalogue.with_totals(p))
            .ok_or(StoreError::NotFound)
    }

    /// Creates a product owned by the caller.
    pub async fn create(&self, user: &Claims, new: NewProduct, now: DateTime<Utc>) -> Product {
        self.insert_with_id(Uuid::new_v4(), &user.subject, new, now).await
    }

    pub(crate) async fn insert_with_id(
        &self,
        id: Uuid,
        owner: &str,
        new: NewProduct,
        now: DateTime<Utc>,
    ) -> Product {
        let product = Product {
            id,
            user_id: owner.to_owned(),
            name: new.name,
            cost: new.cost,
            quantity: new.quantity,
            sold: 0,
            revenue: 0,
            date_created: now,
            date_updated: now,
        };
        self.inner.write().await.products.insert(id, product.clone());
        product
    }

    /// Applies `update`. Only an ADMIN or the product's creator may do this.
    pub async fn update(
        &self,
        user: &Claims,
        id: &str,
        update: UpdateProduct,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let id = parse_id(id)?;
        let mut catalogue = self.inner.write().await;
        let product = catalogue.products.get_mut(&id).ok_or(StoreError::NotFound)?;

        if !user.has_role([ROLE_ADMIN]) && product.user_id != user.subject {
            return Err(StoreError::Forbidden);
        }

        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(cost) = update.cost {
            product.cost = cost;
        }
        if let Some(quantity) = update.quantity {
            product.quantity = quantity;
        }
        product.date_updated = now;
        Ok(())
    }

    /// Removes a product and its sales. Removing a missing product succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = parse_id(id)?;
        let mut catalogue = self.inner.write().await;
        catalogue.products.remove(&id);
        catalogue.sales.remove(&id);
        Ok(())
    }

    pub async fn add_sale(&self, product_id: &str, new: NewSale, now: DateTime<Utc>) -> Result<Sale, StoreError> {
        let product_id = parse_id(product_id)?;
        let mut catalogue = self.inner.write().await;
        if !catalogue.products.contains_key(&product_id) {
            return Err(StoreError::NotFound);
        }

        let sale = Sale {
            id: Uuid::new_v4(),
            product_id,
            quantity: new.quantity,
            paid: new.paid,
            date_created: now,
        };
        catalogue.sales.entry(product_id).or_default().push(sale.clone());
        Ok(sale)
    }

    pub async fn list_sales(&self, product_id: &str) -> Result<Vec<Sale>, StoreError> {
        let product_id = parse_id(product_id)?;
        let catalogue = self.inner.read().await;
        if !catalogue.products.contains_key(&product_id) {
            return Err(StoreError::NotFound);
        }
        Ok(catalogue.sales.get(&product_id).cloned().unwrap_or_default())
    }

    pub(crate) async fn ping(&self) {
        drop(self.inner.read().await);
    }
}
