use crate::domain::applicant::{Application, ApplicationOrigin, ApplicationStatus};
use crate::domain::event::LifecycleEvent;
use crate::domain::identity::{Caller, Role, UserId};
use crate::domain::order::{JobTerms, Order, OrderId, OrderRequest, OrderStatus, StatusUpdate};
use crate::domain::ports::{
    ApplicationLedgerRef, EventEmitterRef, OrderCoordinatorRef, OrderStoreRef,
};
use crate::error::{EngineError, Result};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// The order state machine.
///
/// `LifecycleEngine` validates every transition request against the caller's
/// identity and the order's current status, and applies it through the order
/// store's compare-and-swap primitive. Acceptance goes through the
/// coordinator, which swaps the order and arbitrates its applications in one
/// step. It holds no per-request state; every call carries its own [`Caller`].
pub struct LifecycleEngine {
    orders: OrderStoreRef,
    applications: ApplicationLedgerRef,
    coordinator: OrderCoordinatorRef,
    emitter: EventEmitterRef,
}

fn require_role(caller: &Caller, role: Role, action: &str) -> Result<()> {
    if caller.role == role {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "Only a {role} may {action}, {} is acting as {}",
            caller.user_id, caller.role
        )))
    }
}

fn require_owner(order: &Order, caller: &Caller, action: &str) -> Result<()> {
    if caller.role == Role::Homeowner && order.is_owned_by(&caller.user_id) {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "Only the owner of order {} may {action}",
            order.id
        )))
    }
}

fn require_party(order: &Order, caller: &Caller, action: &str) -> Result<Role> {
    order.party_role(caller).ok_or_else(|| {
        EngineError::Forbidden(format!(
            "{} is not a party to order {} and may not {action} it",
            caller.user_id, order.id
        ))
    })
}

impl LifecycleEngine {
    pub fn new(
        orders: OrderStoreRef,
        applications: ApplicationLedgerRef,
        coordinator: OrderCoordinatorRef,
        emitter: EventEmitterRef,
    ) -> Self {
        Self {
            orders,
            applications,
            coordinator,
            emitter,
        }
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))
    }

    /// Posts a new order in `pending` state.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_order(&self, caller: &Caller, request: OrderRequest) -> Result<Order> {
        require_role(caller, Role::Homeowner, "create orders")?;
        let terms = JobTerms::try_from(request)?;
        let order = self.orders.create(caller.user_id.clone(), terms).await?;

        info!(order_id = %order.id, owner = %order.owner_id, "order created");
        self.emitter
            .emit(LifecycleEvent::OrderCreated {
                order_id: order.id,
                owner_id: order.owner_id.clone(),
            })
            .await;
        Ok(order)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.load(order_id).await
    }

    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        self.orders.get_all().await
    }

    /// Pending orders a maid may still apply to: excludes their own orders and
    /// those where their application was rejected. `job_type` narrows the list
    /// case-insensitively.
    pub async fn list_available_orders(
        &self,
        caller: &Caller,
        job_type: Option<&str>,
    ) -> Result<Vec<Order>> {
        require_role(caller, Role::Maid, "browse available orders")?;
        let rejected: HashSet<OrderId> = self
            .applications
            .for_maid(&caller.user_id)
            .await?
            .into_iter()
            .filter(|a| a.status == ApplicationStatus::Rejected)
            .map(|a| a.order_id)
            .collect();

        Ok(self
            .orders
            .get_all()
            .await?
            .into_iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .filter(|o| !o.is_owned_by(&caller.user_id))
            .filter(|o| !rejected.contains(&o.id))
            .filter(|o| {
                job_type.is_none_or(|t| o.terms.job_type.eq_ignore_ascii_case(t.trim()))
            })
            .collect())
    }

    /// The caller's bookings: owned orders for a homeowner, orders applied to
    /// or assigned for a maid. Optionally narrowed to one status.
    pub async fn list_bookings(
        &self,
        caller: &Caller,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>> {
        let involved: HashSet<OrderId> = match caller.role {
            Role::Homeowner => HashSet::new(),
            Role::Maid => self
                .applications
                .for_maid(&caller.user_id)
                .await?
                .into_iter()
                .map(|a| a.order_id)
                .collect(),
        };

        Ok(self
            .orders
            .get_all()
            .await?
            .into_iter()
            .filter(|o| match caller.role {
                Role::Homeowner => o.is_owned_by(&caller.user_id),
                Role::Maid => o.is_assigned_to(&caller.user_id) || involved.contains(&o.id),
            })
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect())
    }

    /// Applications on an order in arrival order. Owner only.
    pub async fn list_applications(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<Vec<Application>> {
        let order = self.load(order_id).await?;
        require_owner(&order, caller, "view its applications")?;
        self.applications.for_order(order_id).await
    }

    /// A maid offers to take an open order. Re-applying is a no-op that
    /// returns the application already on file.
    #[instrument(level = "debug", skip(self))]
    pub async fn apply(&self, caller: &Caller, order_id: OrderId) -> Result<Application> {
        require_role(caller, Role::Maid, "apply to orders")?;
        let order = self.load(order_id).await?;
        if order.is_owned_by(&caller.user_id) {
            return Err(EngineError::Forbidden(format!(
                "{} cannot apply to their own order {}",
                caller.user_id, order_id
            )));
        }
        self.open_application(&order, caller.user_id.clone(), ApplicationOrigin::MaidApplied)
            .await
    }

    /// The owner invites a specific maid; the maid confirms with
    /// [`accept_request`](Self::accept_request).
    #[instrument(level = "debug", skip(self))]
    pub async fn request_maid(
        &self,
        caller: &Caller,
        order_id: OrderId,
        maid_id: UserId,
    ) -> Result<Application> {
        let order = self.load(order_id).await?;
        require_owner(&order, caller, "request a maid")?;
        if order.is_owned_by(&maid_id) {
            return Err(EngineError::Validation(format!(
                "Order {order_id} cannot be requested from its own owner"
            )));
        }
        self.open_application(&order, maid_id, ApplicationOrigin::OwnerRequest)
            .await
    }

    async fn open_application(
        &self,
        order: &Order,
        maid_id: UserId,
        origin: ApplicationOrigin,
    ) -> Result<Application> {
        if order.status != OrderStatus::Pending {
            return Err(EngineError::InvalidState(format!(
                "Order {} is {} and no longer takes applications",
                order.id, order.status
            )));
        }

        let appended = self
            .applications
            .append(order.id, maid_id.clone(), origin)
            .await?;
        if !appended.is_new() {
            debug!(order_id = %order.id, maid = %maid_id, "application already on file");
            return Ok(appended.into_inner());
        }

        // An acceptance may have landed between the status check and the
        // append; an application opened after arbitration must not stay pending.
        let current = self.load(order.id).await?;
        if current.status != OrderStatus::Pending {
            self.applications
                .reject_if_pending(order.id, &maid_id)
                .await?;
            return Err(EngineError::InvalidState(format!(
                "Order {} became {} while applying",
                order.id, current.status
            )));
        }

        let application = appended.into_inner();
        info!(order_id = %order.id, maid = %maid_id, ?origin, "application received");
        self.emitter
            .emit(LifecycleEvent::ApplicationReceived {
                order_id: order.id,
                owner_id: order.owner_id.clone(),
                maid_id,
            })
            .await;
        Ok(application)
    }

    /// The owner confirms one applicant. Every other pending application is
    /// rejected and the order moves to `in_progress`.
    #[instrument(level = "debug", skip(self))]
    pub async fn accept_applicant(
        &self,
        caller: &Caller,
        order_id: OrderId,
        maid_id: UserId,
    ) -> Result<Order> {
        let order = self.load(order_id).await?;
        require_owner(&order, caller, "accept an applicant")?;
        self.assign(order, maid_id).await
    }

    /// The maid confirms an owner's request. Same transition as
    /// [`accept_applicant`](Self::accept_applicant), entered from the other side.
    #[instrument(level = "debug", skip(self))]
    pub async fn accept_request(&self, caller: &Caller, order_id: OrderId) -> Result<Order> {
        require_role(caller, Role::Maid, "accept a request")?;
        let order = self.load(order_id).await?;

        if order.status == OrderStatus::Pending {
            let app = self
                .applications
                .get(order_id, &caller.user_id)
                .await?
                .ok_or_else(|| {
                    EngineError::not_found("request", format!("{order_id}/{}", caller.user_id))
                })?;
            if app.origin != ApplicationOrigin::OwnerRequest {
                return Err(EngineError::Forbidden(format!(
                    "Order {order_id} has no request from its owner to {}",
                    caller.user_id
                )));
            }
        }

        self.assign(order, caller.user_id.clone()).await
    }

    async fn assign(&self, order: Order, maid_id: UserId) -> Result<Order> {
        let retry = order.status == OrderStatus::InProgress && order.is_assigned_to(&maid_id);
        if order.status != OrderStatus::Pending && !retry {
            return Err(EngineError::InvalidState(format!(
                "Order {} is {}, applicants can only be accepted while pending",
                order.id, order.status
            )));
        }

        let assignment = match self.coordinator.assign(order.id, &maid_id).await {
            Ok(assignment) => assignment,
            Err(EngineError::Conflict(reason)) => {
                warn!(order_id = %order.id, maid = %maid_id, %reason, "lost acceptance race");
                return Err(EngineError::Conflict(reason));
            }
            Err(err) => return Err(err),
        };

        if assignment.newly_assigned {
            info!(
                order_id = %order.id,
                maid = %maid_id,
                rejected = assignment.arbitration.rejected.len(),
                "order assigned"
            );
            self.emitter
                .emit(LifecycleEvent::ApplicationAccepted {
                    order_id: order.id,
                    owner_id: order.owner_id.clone(),
                    maid_id: maid_id.clone(),
                })
                .await;
        } else {
            debug!(order_id = %order.id, maid = %maid_id, "acceptance already applied");
        }
        for rejected in assignment.arbitration.rejected {
            self.emitter
                .emit(LifecycleEvent::ApplicationRejected {
                    order_id: order.id,
                    maid_id: rejected.maid_id,
                })
                .await;
        }
        Ok(assignment.order)
    }

    /// Rejects one pending application without touching the order. Callable
    /// by the owner, or by the maid the application belongs to.
    #[instrument(level = "debug", skip(self))]
    pub async fn decline(
        &self,
        caller: &Caller,
        order_id: OrderId,
        maid_id: UserId,
    ) -> Result<Application> {
        let order = self.load(order_id).await?;
        let is_owner = caller.role == Role::Homeowner && order.is_owned_by(&caller.user_id);
        let is_subject = caller.role == Role::Maid && caller.is(&maid_id);
        if !is_owner && !is_subject {
            return Err(EngineError::Forbidden(format!(
                "{} may not decline the application of {} on order {}",
                caller.user_id, maid_id, order_id
            )));
        }

        let current = self
            .applications
            .get(order_id, &maid_id)
            .await?
            .ok_or_else(|| {
                EngineError::not_found("application", format!("{order_id}/{maid_id}"))
            })?;
        if !current.is_pending() {
            debug!(
                order_id = %order_id,
                maid = %maid_id,
                status = ?current.status,
                "application already resolved"
            );
            return Ok(current);
        }

        let updated = self
            .applications
            .reject_if_pending(order_id, &maid_id)
            .await?
            .ok_or_else(|| {
                EngineError::not_found("application", format!("{order_id}/{maid_id}"))
            })?;

        if updated.status == ApplicationStatus::Rejected {
            info!(
                order_id = %order_id,
                maid = %maid_id,
                by = %caller.user_id,
                "application declined"
            );
            self.emitter
                .emit(LifecycleEvent::ApplicationRejected {
                    order_id,
                    maid_id,
                })
                .await;
        }
        Ok(updated)
    }

    /// Cancels a pending or in-progress order. Terminal orders are rejected.
    #[instrument(level = "debug", skip(self))]
    pub async fn cancel(&self, caller: &Caller, order_id: OrderId) -> Result<Order> {
        let order = self.load(order_id).await?;
        require_party(&order, caller, "cancel")?;
        if order.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "Order {} is already {}",
                order_id, order.status
            )));
        }

        let updated = self
            .orders
            .update_status(
                order_id,
                order.status,
                StatusUpdate::to(OrderStatus::Cancelled),
            )
            .await?;

        info!(order_id = %order_id, from = %order.status, by = %caller.user_id, "order cancelled");
        self.emitter
            .emit(LifecycleEvent::OrderCancelled {
                order_id,
                cancelled_by: caller.user_id.clone(),
                owner_id: updated.owner_id.clone(),
                maid_id: updated.assigned_maid_id.clone(),
            })
            .await;
        Ok(updated)
    }

    /// Completes an in-progress order. Completing an already completed order
    /// returns it unchanged.
    #[instrument(level = "debug", skip(self))]
    pub async fn complete(&self, caller: &Caller, order_id: OrderId) -> Result<Order> {
        let order = self.load(order_id).await?;
        require_party(&order, caller, "complete")?;
        match order.status {
            OrderStatus::Completed => {
                debug!(order_id = %order_id, "order already completed");
                return Ok(order);
            }
            OrderStatus::InProgress => {}
            status => {
                return Err(EngineError::InvalidState(format!(
                    "Order {order_id} is {status}, only in-progress orders can be completed"
                )));
            }
        }

        let updated = match self
            .orders
            .update_status(
                order_id,
                OrderStatus::InProgress,
                StatusUpdate::to(OrderStatus::Completed),
            )
            .await
        {
            Ok(updated) => updated,
            Err(EngineError::Conflict(reason)) => {
                let current = self.load(order_id).await?;
                if current.status == OrderStatus::Completed {
                    return Ok(current);
                }
                return Err(EngineError::Conflict(reason));
            }
            Err(err) => return Err(err),
        };

        info!(order_id = %order_id, by = %caller.user_id, "order completed");
        if let Some(maid_id) = updated.assigned_maid_id.clone() {
            self.emitter
                .emit(LifecycleEvent::OrderCompleted {
                    order_id,
                    owner_id: updated.owner_id.clone(),
                    maid_id,
                })
                .await;
        }
        Ok(updated)
    }
}
