//! Blind address resolution.

use std::sync::Arc;

use blindship_audit::{AccessLogEntry, AccessLogStore, AccessPurpose};
use blindship_core::{AddressFields, CarrierId, OwnerId, PermissionId, Timestamp};
use tracing::{info, warn};

use crate::address_book::AddressBook;
use crate::error::{CapabilityError, CapabilityResult};
use crate::permission::{Permission, PermissionBuilder};
use crate::store::PermissionStore;
use crate::token::ShippingToken;

/// The outcome of a successful resolution.
///
/// `owner_id` is for the broker's own bookkeeping (linking shipments to their
/// owner) and must never be forwarded to a carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The disclosed address.
    pub address: AddressFields,
    /// Whether delivered shipments need the owner's confirmation.
    pub requires_confirmation: bool,
    /// The permission that authorized the disclosure.
    pub permission_id: PermissionId,
    /// The address owner.
    pub owner_id: OwnerId,
    /// Which access this was, 1-based.
    pub access_number: u32,
}

/// Resolves shipping tokens into addresses.
///
/// Every successful resolution consumes exactly one access and leaves exactly
/// one access log entry. If the log entry cannot be written the resolution
/// fails and no address is returned.
pub struct AddressResolver {
    permissions: Arc<dyn PermissionStore>,
    addresses: Arc<dyn AddressBook>,
    access_log: Arc<dyn AccessLogStore>,
}

impl std::fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressResolver").finish_non_exhaustive()
    }
}

impl AddressResolver {
    /// Wire a resolver to its stores.
    #[must_use]
    pub fn new(
        permissions: Arc<dyn PermissionStore>,
        addresses: Arc<dyn AddressBook>,
        access_log: Arc<dyn AccessLogStore>,
    ) -> Self {
        Self {
            permissions,
            addresses,
            access_log,
        }
    }

    /// Issue a new token from `builder` and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder is invalid or the token collides.
    pub async fn issue(&self, builder: PermissionBuilder) -> CapabilityResult<Permission> {
        let permission = builder.build()?;
        self.permissions.insert(&permission).await?;
        info!(
            permission_id = %permission.id,
            owner_id = %permission.owner_id,
            token = %permission.token,
            max_access_count = ?permission.max_access_count,
            "Issued shipping token"
        );
        Ok(permission)
    }

    /// Run every check a resolution would, without consuming an access.
    ///
    /// # Errors
    ///
    /// Returns the first failing check, in resolution order.
    pub async fn inspect(&self, raw_token: &str, carrier: &CarrierId) -> CapabilityResult<Permission> {
        self.authorize(raw_token, carrier, Timestamp::now()).await
    }

    /// Resolve a token to the owner's current address for `carrier`.
    ///
    /// # Errors
    ///
    /// Returns the first failing check, [`CapabilityError::AddressNotFound`]
    /// if the owner has no address, or a storage error.
    pub async fn resolve(&self, raw_token: &str, carrier: &CarrierId) -> CapabilityResult<Resolution> {
        self.resolve_inner(raw_token, carrier, None).await
    }

    /// Resolve for a shipment booking, also checking `service` against the
    /// token's scope before any access is consumed.
    ///
    /// # Errors
    ///
    /// As [`resolve`](Self::resolve), plus
    /// [`CapabilityError::ServiceNotAuthorized`].
    pub async fn resolve_for_service(
        &self,
        raw_token: &str,
        carrier: &CarrierId,
        service: &str,
    ) -> CapabilityResult<Resolution> {
        self.resolve_inner(raw_token, carrier, Some(service)).await
    }

    /// Revoke a token. Revoking twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidTokenFormat`] or
    /// [`CapabilityError::TokenNotFound`].
    pub async fn revoke(&self, raw_token: &str) -> CapabilityResult<Permission> {
        let token = ShippingToken::parse(raw_token)?;
        let permission = self.permissions.revoke(&token).await?;
        info!(permission_id = %permission.id, "Revoked shipping token");
        Ok(permission)
    }

    /// The access log for one permission, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub async fn access_log(&self, permission_id: &PermissionId) -> CapabilityResult<Vec<AccessLogEntry>> {
        Ok(self.access_log.entries_for(permission_id).await?)
    }

    /// The permission store this resolver reads.
    #[must_use]
    pub fn permissions(&self) -> &Arc<dyn PermissionStore> {
        &self.permissions
    }

    async fn authorize(
        &self,
        raw_token: &str,
        carrier: &CarrierId,
        now: Timestamp,
    ) -> CapabilityResult<Permission> {
        let token = ShippingToken::parse(raw_token)?;
        let permission = self
            .permissions
            .find_by_token(&token)
            .await?
            .ok_or(CapabilityError::TokenNotFound)?;
        permission.check_usable(&now)?;
        permission.check_carrier(carrier)?;
        Ok(permission)
    }

    async fn resolve_inner(
        &self,
        raw_token: &str,
        carrier: &CarrierId,
        service: Option<&str>,
    ) -> CapabilityResult<Resolution> {
        let now = Timestamp::now();
        let result = self.try_resolve(raw_token, carrier, service, now).await;
        if let Err(e) = &result {
            warn!(
                carrier = %carrier,
                code = e.code(),
                error = %e,
                "Address resolution denied"
            );
        }
        result
    }

    async fn try_resolve(
        &self,
        raw_token: &str,
        carrier: &CarrierId,
        service: Option<&str>,
        now: Timestamp,
    ) -> CapabilityResult<Resolution> {
        let permission = self.authorize(raw_token, carrier, now).await?;
        if let Some(service) = service {
            permission.check_service(service)?;
        }

        let address = self
            .addresses
            .latest(&permission.owner_id)
            .await?
            .ok_or_else(|| CapabilityError::AddressNotFound {
                owner_id: permission.owner_id.to_string(),
            })?
            .fields();

        // The counter is the only shared mutable state; everything above
        // was read-only.
        let updated = self.permissions.record_access(&permission.id, now).await?;

        let purpose = match service {
            Some(service) => AccessPurpose::CreateShipment {
                service: service.to_owned(),
            },
            None => AccessPurpose::Resolve,
        };
        let entry = AccessLogEntry::new(
            updated.id,
            carrier.clone(),
            address.disclosed(),
            updated.access_count,
            purpose,
        );
        self.access_log.append(&entry).await?;

        info!(
            permission_id = %updated.id,
            carrier = %carrier,
            access_number = updated.access_count,
            remaining = ?updated.remaining_accesses(),
            "Resolved shipping token"
        );

        Ok(Resolution {
            address,
            requires_confirmation: updated.scope.require_delivery_confirmation(),
            permission_id: updated.id,
            owner_id: updated.owner_id,
            access_number: updated.access_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_book::KvAddressBook;
    use crate::scope::ShippingScope;
    use crate::store::KvPermissionStore;
    use blindship_audit::KvAccessLogStore;
    use blindship_core::PhysicalAddress;
    use blindship_storage::{KvStore, MemoryKvStore};
    use chrono::Duration;

    struct Fixture {
        resolver: Arc<AddressResolver>,
        book: Arc<KvAddressBook>,
        owner: OwnerId,
    }

    async fn fixture() -> Fixture {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let book = Arc::new(KvAddressBook::new(Arc::clone(&kv)));
        let resolver = Arc::new(AddressResolver::new(
            Arc::new(KvPermissionStore::new(Arc::clone(&kv)).unwrap()),
            Arc::clone(&book) as Arc<dyn AddressBook>,
            Arc::new(KvAccessLogStore::new(kv)),
        ));
        let owner = OwnerId::new();
        book.record(
            &owner,
            &PhysicalAddress::new("123 Main St", "Anytown", "CA", "90210", "US"),
        )
        .await
        .unwrap();
        Fixture {
            resolver,
            book,
            owner,
        }
    }

    fn carrier(id: &str) -> CarrierId {
        CarrierId::new(id).unwrap()
    }

    fn builder(owner: OwnerId, confirm: bool) -> PermissionBuilder {
        let scope =
            ShippingScope::new([carrier("usps"), carrier("ups")], ["Priority", "Ground"], confirm)
                .unwrap();
        PermissionBuilder::new(owner, scope)
    }

    #[tokio::test]
    async fn test_resolve_discloses_address_and_logs() {
        let f = fixture().await;
        let p = f
            .resolver
            .issue(builder(f.owner, true).max_access_count(3))
            .await
            .unwrap();

        let r = f
            .resolver
            .resolve(p.token.expose(), &carrier("usps"))
            .await
            .unwrap();
        assert_eq!(r.address.street_address, "123 Main St");
        assert_eq!(r.address.postal_code, "90210");
        assert!(r.requires_confirmation);
        assert_eq!(r.access_number, 1);
        assert_eq!(r.owner_id, f.owner);

        let log = f.resolver.access_log(&p.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].access_number, 1);
        assert_eq!(log[0].carrier, carrier("usps"));
        assert_eq!(log[0].purpose, AccessPurpose::Resolve);
    }

    #[tokio::test]
    async fn test_resolution_order() {
        let f = fixture().await;

        assert!(matches!(
            f.resolver.resolve("bogus", &carrier("usps")).await,
            Err(CapabilityError::InvalidTokenFormat)
        ));
        assert!(matches!(
            f.resolver
                .resolve(ShippingToken::generate().expose(), &carrier("usps"))
                .await,
            Err(CapabilityError::TokenNotFound)
        ));

        // Revoked and out of scope: revocation is reported first.
        let p = f.resolver.issue(builder(f.owner, false)).await.unwrap();
        f.resolver.revoke(p.token.expose()).await.unwrap();
        assert!(matches!(
            f.resolver.resolve(p.token.expose(), &carrier("dhl")).await,
            Err(CapabilityError::TokenRevoked { .. })
        ));

        let p = f.resolver.issue(builder(f.owner, false)).await.unwrap();
        assert!(matches!(
            f.resolver.resolve(p.token.expose(), &carrier("dhl")).await,
            Err(CapabilityError::CarrierNotAuthorized { .. })
        ));
        // A rejected carrier does not consume the single access.
        f.resolver
            .resolve(p.token.expose(), &carrier("ups"))
            .await
            .unwrap();
        assert!(matches!(
            f.resolver.resolve(p.token.expose(), &carrier("ups")).await,
            Err(CapabilityError::AccessLimitReached { max: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_expiry_dominates_other_failures() {
        let f = fixture().await;
        let p = f
            .resolver
            .issue(builder(f.owner, false).expires_in(Duration::milliseconds(50)))
            .await
            .unwrap();
        f.resolver.revoke(p.token.expose()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        assert!(matches!(
            f.resolver.resolve(p.token.expose(), &carrier("fedex")).await,
            Err(CapabilityError::TokenExpired { .. })
        ));
    }

    #[tokio::test]
    async fn test_service_rejection_consumes_nothing() {
        let f = fixture().await;
        let p = f.resolver.issue(builder(f.owner, false)).await.unwrap();

        assert!(matches!(
            f.resolver
                .resolve_for_service(p.token.expose(), &carrier("usps"), "Overnight")
                .await,
            Err(CapabilityError::ServiceNotAuthorized { .. })
        ));
        let stored = f.resolver.permissions().get(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.access_count, 0);
        assert!(f.resolver.access_log(&p.id).await.unwrap().is_empty());

        let r = f
            .resolver
            .resolve_for_service(p.token.expose(), &carrier("usps"), "ground")
            .await
            .unwrap();
        assert_eq!(r.access_number, 1);
        let log = f.resolver.access_log(&p.id).await.unwrap();
        assert_eq!(
            log[0].purpose,
            AccessPurpose::CreateShipment {
                service: "ground".into()
            }
        );
    }

    #[tokio::test]
    async fn test_inspect_does_not_consume() {
        let f = fixture().await;
        let p = f.resolver.issue(builder(f.owner, false)).await.unwrap();

        f.resolver
            .inspect(p.token.expose(), &carrier("usps"))
            .await
            .unwrap();
        f.resolver
            .inspect(p.token.expose(), &carrier("usps"))
            .await
            .unwrap();
        f.resolver
            .resolve(p.token.expose(), &carrier("usps"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_address_not_found() {
        let f = fixture().await;
        let stranger = OwnerId::new();
        let p = f.resolver.issue(builder(stranger, false)).await.unwrap();

        assert!(matches!(
            f.resolver.resolve(p.token.expose(), &carrier("usps")).await,
            Err(CapabilityError::AddressNotFound { .. })
        ));
        let stored = f.resolver.permissions().get(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.access_count, 0);
    }

    #[tokio::test]
    async fn test_resolve_returns_current_address() {
        let f = fixture().await;
        let p = f
            .resolver
            .issue(builder(f.owner, false).unlimited())
            .await
            .unwrap();

        f.resolver
            .resolve(p.token.expose(), &carrier("usps"))
            .await
            .unwrap();
        f.book
            .record(
                &f.owner,
                &PhysicalAddress::new("9 Moved Ln", "Anytown", "CA", "90211", "US")
                    .with_created_at(Timestamp::from_now(Duration::seconds(1))),
            )
            .await
            .unwrap();

        let r = f
            .resolver
            .resolve(p.token.expose(), &carrier("usps"))
            .await
            .unwrap();
        assert_eq!(r.address.street_address, "9 Moved Ln");
        assert_eq!(r.access_number, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_resolutions_honor_limit() {
        let f = fixture().await;
        let p = f
            .resolver
            .issue(builder(f.owner, false).max_access_count(3))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..24 {
            let resolver = Arc::clone(&f.resolver);
            let token = p.token.expose().to_owned();
            handles.push(tokio::spawn(async move {
                resolver.resolve(&token, &carrier("usps")).await
            }));
        }

        let mut numbers = Vec::new();
        for h in handles {
            match h.await.unwrap() {
                Ok(r) => numbers.push(r.access_number),
                Err(CapabilityError::AccessLimitReached { .. }) => {},
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(f.resolver.access_log(&p.id).await.unwrap().len(), 3);
    }
}
