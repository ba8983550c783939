use std::sync::Arc;

use chrono::Utc;
use http::StatusCode;

use super::{claims, store_error};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::store::{NewProduct, NewSale, Store, UpdateProduct};

fn id(req: &Request) -> &str {
    req.param("id").unwrap_or_default()
}

pub(super) async fn list(store: Arc<Store>, _req: Request) -> Result<Response, Error> {
    Response::json(StatusCode::OK, &store.products.list().await)
}

pub(super) async fn retrieve(store: Arc<Store>, req: Request) -> Result<Response, Error> {
    let product = store
        .products
        .retrieve(id(&req))
        .await
        .map_err(store_error("product", "retrieving product"))?;
    Response::json(StatusCode::OK, &product)
}

pub(super) async fn create(store: Arc<Store>, req: Request) -> Result<Response, Error> {
    let new: NewProduct = req.decode()?;
    let product = store.products.create(claims(&req)?, new, Utc::now()).await;
    Response::json(StatusCode::CREATED, &product)
}

/// Partial update; `204` on success. See [`Products::update`](crate::store::Products::update)
/// for who may do it.
pub(super) async fn update(store: Arc<Store>, req: Request) -> Result<Response, Error> {
    let update: UpdateProduct = req.decode()?;
    store
        .products
        .update(claims(&req)?, id(&req), update, Utc::now())
        .await
        .map_err(store_error("product", "updating product"))?;
    Ok(Response::status(StatusCode::NO_CONTENT))
}

pub(super) async fn delete(store: Arc<Store>, req: Request) -> Result<Response, Error> {
    store
        .products
        .delete(id(&req))
        .await
        .map_err(store_error("product", "deleting product"))?;
    Ok(Response::status(StatusCode::NO_CONTENT))
}

pub(super) async fn add_sale(store: Arc<Store>, req: Request) -> Result<Response, Error> {
    let new: NewSale = req.decode()?;
    let sale = store
        .products
        .add_sale(id(&req), new, Utc::now())
        .await
        .map_err(store_error("product", "adding sale"))?;
    Response::json(StatusCode::CREATED, &sale)
}

pub(super) async fn list_sales(store: Arc<Store>, req: Request) -> Result<Response, Error> {
    let sales = store
        .products
        .list_sales(id(&req))
        .await
        .map_err(store_error("product", "listing sales"))?;
    Response::json(StatusCode::OK, &sales)
}
