//! Writing resource objects.

use tracing::{debug, instrument, warn};

use xavyo_resource::delta::ObjectDelta;
use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::operation::{AttributeDelta, ConnectorOutcome, PendingOperationStatus, Uid};
use xavyo_resource::schema::AssociationDirection;
use xavyo_resource::traits::{Connector, CreateOp, DeleteOp, UpdateOp};
use xavyo_resource::value::AttributeValue;

use super::conversion::{
    entitlement_change, find_by_native_name, required_association, to_attribute_set,
    translate_delta, uid_from_identifiers, EntitlementChange,
};
use super::types::AsynchronousOperationResult;
use super::{
    compute_result_status, record_fatal, ProvisioningContext, ResourceObjectConverter,
    MODIFY_ENTITLEMENT,
};
use crate::result::{OperationResult, OperationResultStatus};
use crate::shadow::{AbstractShadow, ShadowBean};

impl ResourceObjectConverter {
    /// Create the object described by `bean` on the resource.
    ///
    /// Returns the bean with the identifier assigned by the resource. Object
    /// side associations are written to the entitlement objects afterwards;
    /// failures there make the result a partial error.
    #[instrument(skip(self, ctx, bean, result), fields(resource_id = %ctx.resource_id(), object_class = %ctx.object_class()))]
    pub async fn add_resource_object(
        &self,
        ctx: &ProvisioningContext,
        bean: &ShadowBean,
        result: &mut OperationResult,
    ) -> ResourceResult<AsynchronousOperationResult<ShadowBean>> {
        let op = result.create_subresult("addResourceObject");
        if !ctx.capabilities().create {
            return Err(record_fatal(op, ResourceError::unsupported("create")));
        }
        let attributes = match to_attribute_set(ctx.definition(), bean) {
            Ok(set) => set,
            Err(e) => return Err(record_fatal(op, e)),
        };

        let create = op.create_subresult("connector.create");
        let outcome = match ctx
            .connector()
            .create(ctx.object_class(), &bean.auxiliary_object_classes, attributes)
            .await
        {
            Ok(outcome) => outcome,
            Err(fault) => {
                let e = record_fatal(create, ResourceError::from_fault(fault, "create"));
                compute_result_status(op);
                return Err(e);
            }
        };
        record_outcome(create, &outcome);
        debug!(uid = %outcome.value, pending = outcome.is_pending(), "Object created");

        let mut created = bean.clone();
        set_uid(ctx, &mut created, &outcome.value);
        created.exists = !outcome.is_pending();

        let mut changes = Vec::new();
        for (name, values) in &created.associations {
            let Some(assoc_def) = ctx.definition().find_association_definition(name) else {
                continue;
            };
            if assoc_def.direction() != AssociationDirection::ObjectToSubject {
                continue;
            }
            for value in values {
                changes.push(entitlement_change(ctx, assoc_def, value, true));
            }
        }
        self.apply_entitlements(ctx, &created, changes, op).await;

        compute_result_status(op);
        Ok(finish(op, created, ctx))
    }

    /// Apply `delta` to the object behind `shadow`.
    ///
    /// Returns the shadow content after the change, with a renamed primary
    /// identifier when the resource reports one.
    #[instrument(skip(self, ctx, shadow, delta, result), fields(resource_id = %ctx.resource_id(), object_class = %ctx.object_class()))]
    pub async fn modify_resource_object(
        &self,
        ctx: &ProvisioningContext,
        shadow: &AbstractShadow,
        delta: &ObjectDelta,
        result: &mut OperationResult,
    ) -> ResourceResult<AsynchronousOperationResult<ShadowBean>> {
        let op = result.create_subresult("modifyResourceObject");
        if delta.is_add() || delta.is_delete() {
            return Err(record_fatal(
                op,
                ResourceError::internal(format!(
                    "modify called with a {} delta",
                    delta.change_type().as_str()
                )),
            ));
        }
        if !ctx.capabilities().update {
            return Err(record_fatal(op, ResourceError::unsupported("update")));
        }
        let uid = match primary_uid(ctx, shadow) {
            Ok(uid) => uid,
            Err(e) => return Err(record_fatal(op, e)),
        };
        op.add_param("uid", &uid);
        let translated = match translate_delta(ctx, delta) {
            Ok(translated) => translated,
            Err(e) => return Err(record_fatal(op, e)),
        };

        let mut updated = shadow.clone();
        if let Err(e) = updated.update_with(delta) {
            return Err(record_fatal(op, e));
        }
        let mut updated = updated.into_bean();

        if !translated.attribute_delta.is_empty() {
            let update = op.create_subresult("connector.update");
            let outcome = match ctx
                .connector()
                .update(ctx.object_class(), &uid, translated.attribute_delta)
                .await
            {
                Ok(outcome) => outcome,
                Err(fault) => {
                    let e = record_fatal(update, ResourceError::from_fault(fault, "update"));
                    compute_result_status(op);
                    return Err(e);
                }
            };
            record_outcome(update, &outcome);
            if outcome.value != uid {
                debug!(old = %uid, new = %outcome.value, "Object renamed");
                set_uid(ctx, &mut updated, &outcome.value);
            }
        }

        let changes = translated.entitlements.into_iter().map(Ok).collect();
        self.apply_entitlements(ctx, &updated, changes, op).await;

        compute_result_status(op);
        Ok(finish(op, updated, ctx))
    }

    /// Delete the object behind `shadow`.
    ///
    /// Memberships held on entitlement objects are removed first.
    #[instrument(skip(self, ctx, shadow, result), fields(resource_id = %ctx.resource_id(), object_class = %ctx.object_class()))]
    pub async fn delete_resource_object(
        &self,
        ctx: &ProvisioningContext,
        shadow: &AbstractShadow,
        result: &mut OperationResult,
    ) -> ResourceResult<AsynchronousOperationResult<()>> {
        let op = result.create_subresult("deleteResourceObject");
        if !ctx.capabilities().delete {
            return Err(record_fatal(op, ResourceError::unsupported("delete")));
        }
        let uid = match primary_uid(ctx, shadow) {
            Ok(uid) => uid,
            Err(e) => return Err(record_fatal(op, e)),
        };
        op.add_param("uid", &uid);

        let mut changes = Vec::new();
        for (name, values) in shadow.get_associations() {
            let assoc_def = match required_association(ctx.definition(), name) {
                Ok(def) => def,
                Err(e) => return Err(record_fatal(op, e)),
            };
            if assoc_def.direction() != AssociationDirection::ObjectToSubject {
                continue;
            }
            for value in values {
                changes.push(entitlement_change(ctx, assoc_def, value, false));
            }
        }
        self.apply_entitlements(ctx, shadow.bean(), changes, op).await;

        let delete = op.create_subresult("connector.delete");
        match ctx.connector().delete(ctx.object_class(), &uid).await {
            Ok(outcome) => record_outcome(delete, &outcome),
            Err(fault) => {
                let e = record_fatal(delete, ResourceError::from_fault(fault, "delete"));
                compute_result_status(op);
                return Err(e);
            }
        }

        compute_result_status(op);
        Ok(finish(op, (), ctx))
    }

    /// Ask the resource how an asynchronously executing operation is doing.
    ///
    /// Not applicable, without contacting the connector, unless the resource
    /// supports operation status queries.
    #[instrument(skip(self, ctx, result), fields(resource_id = %ctx.resource_id()))]
    pub async fn refresh_operation_status(
        &self,
        ctx: &ProvisioningContext,
        async_reference: &str,
        result: &mut OperationResult,
    ) -> ResourceResult<OperationResultStatus> {
        let sub = result.create_subresult("refreshOperationStatus");
        sub.add_param("asyncReference", async_reference);

        let status_op = if ctx.capabilities().async_operation_status {
            ctx.connector().operation_status()
        } else {
            None
        };
        let Some(status_op) = status_op else {
            sub.record_not_applicable("resource does not report operation status");
            return Ok(OperationResultStatus::NotApplicable);
        };

        match status_op.operation_status(async_reference).await {
            Ok(PendingOperationStatus::InProgress) => {
                sub.record_in_progress(Some(async_reference.to_string()))
            }
            Ok(PendingOperationStatus::Succeeded) => sub.record_success(),
            Ok(PendingOperationStatus::Failed { message }) => {
                sub.record_fatal_error(&ResourceError::generic_connector(message))
            }
            Err(fault) => {
                return Err(record_fatal(
                    sub,
                    ResourceError::from_fault(fault, "operation status"),
                ))
            }
        }
        Ok(sub.status())
    }

    /// Write membership changes to entitlement objects, one sub-result each.
    async fn apply_entitlements(
        &self,
        ctx: &ProvisioningContext,
        subject: &ShadowBean,
        changes: Vec<ResourceResult<EntitlementChange>>,
        op: &mut OperationResult,
    ) {
        for change in changes {
            let sub = op.create_subresult(MODIFY_ENTITLEMENT);
            let change = match change {
                Ok(change) => change,
                Err(e) => {
                    warn!(error = %e, "Cannot identify entitlement");
                    sub.record_fatal_error(&e);
                    continue;
                }
            };
            sub.add_param("association", &change.association);
            sub.add_param("entitlement", &change.target_uid);

            let delta = match membership_delta(ctx, subject, &change) {
                Ok(delta) => delta,
                Err(e) => {
                    warn!(association = %change.association, error = %e, "Cannot build entitlement change");
                    sub.record_fatal_error(&e);
                    continue;
                }
            };
            match ctx
                .connector()
                .update(&change.target_class, &change.target_uid, delta)
                .await
            {
                Ok(outcome) => record_outcome(sub, &outcome),
                Err(fault) => {
                    let e = ResourceError::from_fault(fault, MODIFY_ENTITLEMENT);
                    warn!(
                        association = %change.association,
                        entitlement = %change.target_uid,
                        error = %e,
                        "Entitlement change failed"
                    );
                    sub.record_fatal_error(&e);
                }
            }
        }
    }
}

/// Attribute change on the entitlement object adding or removing the subject.
fn membership_delta(
    ctx: &ProvisioningContext,
    subject: &ShadowBean,
    change: &EntitlementChange,
) -> ResourceResult<AttributeDelta> {
    let assoc_def = required_association(ctx.definition(), &change.association)?;
    let value = subject
        .attributes
        .iter()
        .find(|a| a.name() == assoc_def.value_attribute())
        .and_then(|a| a.values().first().cloned())
        .ok_or_else(|| {
            ResourceError::schema(format!(
                "subject has no '{}' value for association '{}'",
                assoc_def.value_attribute(),
                change.association
            ))
        })?;
    let mut delta = AttributeDelta::new();
    if change.add {
        delta.add(assoc_def.association_attribute(), vec![value]);
    } else {
        delta.remove(assoc_def.association_attribute(), vec![value]);
    }
    Ok(delta)
}

fn primary_uid(ctx: &ProvisioningContext, shadow: &AbstractShadow) -> ResourceResult<Uid> {
    let identifiers = shadow.get_identifiers()?.ok_or_else(|| {
        ResourceError::schema(format!("shadow of {} has no identifiers", ctx.definition()))
    })?;
    uid_from_identifiers(ctx.definition(), &identifiers)?.ok_or_else(|| {
        ResourceError::schema(format!(
            "shadow of {} has no primary identifier value",
            ctx.definition()
        ))
    })
}

/// Store the resource-assigned UID in the attribute it maps to.
fn set_uid(ctx: &ProvisioningContext, bean: &mut ShadowBean, uid: &Uid) {
    let Some(uid_def) = find_by_native_name(ctx.definition(), uid.attribute_name()) else {
        return;
    };
    let value = AttributeValue::from(uid.value());
    match bean.attributes.iter_mut().find(|a| a.name() == uid_def.name()) {
        Some(attr) => attr.replace_values(vec![value]),
        None => {
            if let Ok(attr) = uid_def.instantiate(vec![value]) {
                bean.attributes.push(attr);
            }
        }
    }
}

fn record_outcome<T>(result: &mut OperationResult, outcome: &ConnectorOutcome<T>) {
    match &outcome.pending_reference {
        Some(reference) => result.record_in_progress(Some(reference.clone())),
        None => result.record_success(),
    }
}

fn finish<T>(
    op: &OperationResult,
    return_value: T,
    ctx: &ProvisioningContext,
) -> AsynchronousOperationResult<T> {
    AsynchronousOperationResult {
        return_value,
        status: op.status(),
        async_reference: op.async_reference().map(str::to_string),
        quantum_operation: ctx.is_quantum(),
    }
}
