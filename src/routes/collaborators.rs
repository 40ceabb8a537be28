//! Route groups owned by the business-domain modules.
//!
//! Each [`Domain`] is mounted under a fixed prefix. The gateway never
//! looks inside a collaborator; it only strips the prefix and forwards
//! the request to whatever router the collaborator supplies.

use crate::error::AppError;
use crate::state::AppState;
use axum::Router;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Business domains reachable through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    ContactUs,
    Products,
    ProductAdmin,
    Auth,
    User,
    Cart,
    Payment,
    Orders,
    Coupons,
    Advertisements,
    Warehouse,
}

impl Domain {
    pub const ALL: [Domain; 11] = [
        Domain::ContactUs,
        Domain::Products,
        Domain::ProductAdmin,
        Domain::Auth,
        Domain::User,
        Domain::Cart,
        Domain::Payment,
        Domain::Orders,
        Domain::Coupons,
        Domain::Advertisements,
        Domain::Warehouse,
    ];

    /// Path prefix the domain is mounted under
    pub fn prefix(self) -> &'static str {
        match self {
            Domain::ContactUs => "/api/contact-us",
            Domain::Products => "/api/products",
            Domain::ProductAdmin => "/api/products/admin",
            Domain::Auth => "/api/auth",
            Domain::User => "/api/user",
            Domain::Cart => "/api/cart",
            Domain::Payment => "/api/payment",
            Domain::Orders => "/api/orders",
            Domain::Coupons => "/api/coupons",
            Domain::Advertisements => "/api/advertisements",
            Domain::Warehouse => "/api/warehouse",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Domain::ContactUs => "contact message intake",
            Domain::Products => "product catalog read/search",
            Domain::ProductAdmin => "product catalog administration",
            Domain::Auth => "authentication/session issuance",
            Domain::User => "user profile management",
            Domain::Cart => "shopping cart mutation",
            Domain::Payment => "payment processing",
            Domain::Orders => "order lifecycle",
            Domain::Coupons => "discount-coupon rules",
            Domain::Advertisements => "promotional content",
            Domain::Warehouse => "inventory/fulfillment",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A module that handles every request under one [`Domain`] prefix.
///
/// Paths seen by the returned router are relative to the prefix.
pub trait Collaborator: Send + Sync {
    fn routes(&self, state: AppState) -> Router;
}

impl Collaborator for Router {
    fn routes(&self, _state: AppState) -> Router {
        self.clone()
    }
}

/// Registry of collaborators by domain
#[derive(Clone, Default)]
pub struct Collaborators {
    registered: HashMap<Domain, Arc<dyn Collaborator>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(mut self, domain: Domain, collaborator: C) -> Self
    where
        C: Collaborator + 'static,
    {
        self.registered.insert(domain, Arc::new(collaborator));
        self
    }

    pub fn get(&self, domain: Domain) -> Option<&Arc<dyn Collaborator>> {
        self.registered.get(&domain)
    }

    /// Build the router for `domain`, or a placeholder when none is registered
    pub fn router_for(&self, domain: Domain, state: &AppState) -> Router {
        match self.get(domain) {
            Some(collaborator) => collaborator.routes(state.clone()),
            None => {
                tracing::warn!(prefix = domain.prefix(), "No handlers registered");
                unavailable(domain)
            }
        }
    }
}

fn unavailable(domain: Domain) -> Router {
    Router::new().fallback(move || async move { AppError::CollaboratorUnavailable(domain) })
}
