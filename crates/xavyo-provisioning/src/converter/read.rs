//! Reading resource objects.

use tracing::{debug, instrument, warn};

use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::item::AssociationValue;
use xavyo_resource::operation::{ConnectorObject, Filter, PageRequest};
use xavyo_resource::schema::AssociationDirection;
use xavyo_resource::traits::SearchOp;

use super::conversion::{
    attributes_to_get, entitlement_reference, find_by_native_name, native_name_of, object_value,
    secondary_filter, target_class, to_shadow_bean, uid_from_identifiers,
};
use super::types::{CompleteResourceObject, SearchResultMetadata};
use super::{record_fatal, ProvisioningContext, ResourceObjectConverter};
use crate::config::ErrorReportingMode;
use crate::result::OperationResult;
use crate::shadow::{AbstractShadow, ResourceObjectIdentifiers, ShadowBean};

impl ResourceObjectConverter {
    /// Fetch an object by its identifiers.
    ///
    /// Returns `None` only when reads are served from the cache and no cached
    /// shadow is available; a missing object is an error.
    #[instrument(skip(self, ctx, cached, result), fields(resource_id = %ctx.resource_id(), identifiers = %identifiers))]
    pub async fn get_resource_object(
        &self,
        ctx: &ProvisioningContext,
        identifiers: &ResourceObjectIdentifiers,
        cached: Option<&AbstractShadow>,
        fetch_associations: bool,
        result: &mut OperationResult,
    ) -> ResourceResult<Option<CompleteResourceObject>> {
        let sub = result.create_subresult("getResourceObject");
        sub.add_param("identifiers", identifiers);

        if !ctx.capabilities().can_read() || ctx.capabilities().is_read_cache_only() {
            return Ok(match cached {
                Some(shadow) => {
                    debug!("Returning cached shadow, resource reads are cache-only");
                    sub.record_success();
                    Some(CompleteResourceObject::ok(shadow.bean().clone()))
                }
                None => {
                    sub.record_not_applicable("reads are cache-only and no cached shadow given");
                    None
                }
            });
        }

        match self
            .fetch_by_identifiers(ctx, identifiers, fetch_associations)
            .await
        {
            Ok(object) => {
                sub.record_success();
                Ok(Some(object))
            }
            Err(e) => Err(record_fatal(sub, e)),
        }
    }

    /// Find an object by primary identifier, or by searching on secondary
    /// identifiers when the primary one is unknown.
    #[instrument(skip(self, ctx, result), fields(resource_id = %ctx.resource_id(), identifiers = %identifiers))]
    pub async fn locate_resource_object(
        &self,
        ctx: &ProvisioningContext,
        identifiers: &ResourceObjectIdentifiers,
        fetch_associations: bool,
        result: &mut OperationResult,
    ) -> ResourceResult<CompleteResourceObject> {
        let sub = result.create_subresult("locateResourceObject");
        sub.add_param("identifiers", identifiers);
        match self
            .fetch_by_identifiers(ctx, identifiers, fetch_associations)
            .await
        {
            Ok(object) => {
                sub.record_success();
                Ok(object)
            }
            Err(e) => Err(record_fatal(sub, e)),
        }
    }

    async fn fetch_by_identifiers(
        &self,
        ctx: &ProvisioningContext,
        identifiers: &ResourceObjectIdentifiers,
        fetch_associations: bool,
    ) -> ResourceResult<CompleteResourceObject> {
        let definition = ctx.definition();
        let object = match uid_from_identifiers(definition, identifiers)? {
            Some(uid) => ctx
                .read_connector()
                .get(ctx.object_class(), &uid, attributes_to_get(definition))
                .await
                .map_err(|f| ResourceError::from_fault(f, "get"))?
                .ok_or_else(|| ResourceError::not_found(uid.to_string()))?,
            None => {
                let filter = secondary_filter(definition, identifiers).ok_or_else(|| {
                    ResourceError::schema(format!(
                        "cannot locate object of {definition}: no identifier values"
                    ))
                })?;
                let found = ctx
                    .read_connector()
                    .search(
                        ctx.object_class(),
                        Some(filter),
                        attributes_to_get(definition),
                        None,
                    )
                    .await
                    .map_err(|f| ResourceError::from_fault(f, "search"))?;
                let mut objects = found.objects.into_iter();
                match (objects.next(), objects.next()) {
                    (Some(object), None) => object,
                    (None, _) => return Err(ResourceError::not_found(identifiers.to_string())),
                    (Some(_), Some(_)) => {
                        return Err(ResourceError::schema(format!(
                            "secondary identifiers {identifiers} match more than one object"
                        )))
                    }
                }
            }
        };
        self.complete(ctx, &object, fetch_associations).await
    }

    /// Search objects of the context's class, streaming them to `handler`.
    ///
    /// The handler returns `false` to stop the search. Objects that fail to
    /// convert are treated according to `mode`.
    #[instrument(skip(self, ctx, filter, handler, result), fields(resource_id = %ctx.resource_id(), object_class = %ctx.object_class(), mode = %mode))]
    pub async fn search_resource_objects<H>(
        &self,
        ctx: &ProvisioningContext,
        filter: Option<Filter>,
        fetch_associations: bool,
        mode: ErrorReportingMode,
        mut handler: H,
        result: &mut OperationResult,
    ) -> ResourceResult<SearchResultMetadata>
    where
        H: FnMut(CompleteResourceObject) -> bool + Send,
    {
        let sub = result.create_subresult("searchResourceObjects");
        let definition = ctx.definition();
        let mut metadata = SearchResultMetadata::default();
        let mut page = PageRequest::new(self.config().search_page_size.max(1));

        loop {
            let page_result = match ctx
                .read_connector()
                .search(
                    ctx.object_class(),
                    filter.clone(),
                    attributes_to_get(definition),
                    Some(page.clone()),
                )
                .await
            {
                Ok(r) => r,
                Err(fault) => return Err(record_fatal(sub, ResourceError::from_fault(fault, "search"))),
            };
            metadata.approximate_number_all_results = page_result.total_count;
            metadata.partial_results |= page_result.partial;

            for object in &page_result.objects {
                let complete = match self.complete(ctx, object, fetch_associations).await {
                    Ok(complete) => complete,
                    Err(e) => match mode {
                        ErrorReportingMode::FailFast => return Err(record_fatal(sub, e)),
                        ErrorReportingMode::ContinueAndCollect => {
                            warn!(uid = %object.uid, error = %e, "Skipping object that failed to convert");
                            metadata.errors.push(format!("{}: {e}", object.uid));
                            continue;
                        }
                        ErrorReportingMode::ReportAsFetchError => {
                            CompleteResourceObject::with_error(
                                failed_object_bean(ctx, object),
                                e.to_string(),
                            )
                        }
                    },
                };
                metadata.handled += 1;
                if !handler(complete) {
                    debug!(handled = metadata.handled, "Search stopped by handler");
                    metadata.stopped_by_handler = true;
                    metadata.paging_cookie = page_result.next_cursor.clone();
                    sub.record_success();
                    return Ok(metadata);
                }
            }

            let exhausted = page_result.objects.is_empty();
            match page_result.next_cursor {
                Some(cursor) if !exhausted => page = page.with_cursor(cursor),
                _ => break,
            }
        }

        if metadata.errors.is_empty() {
            sub.record_success();
        } else {
            sub.record_partial_error(format!("{} object(s) skipped", metadata.errors.len()));
        }
        Ok(metadata)
    }

    /// Convert a connector object and resolve entitlement-side associations.
    pub(crate) async fn complete(
        &self,
        ctx: &ProvisioningContext,
        object: &ConnectorObject,
        fetch_associations: bool,
    ) -> ResourceResult<CompleteResourceObject> {
        let mut bean = to_shadow_bean(ctx, object, fetch_associations)?;
        if fetch_associations {
            self.fetch_entitlements(ctx, object, &mut bean).await?;
        }
        Ok(CompleteResourceObject::ok(bean))
    }

    /// Find entitlement objects that list the subject as a member.
    async fn fetch_entitlements(
        &self,
        ctx: &ProvisioningContext,
        subject: &ConnectorObject,
        bean: &mut ShadowBean,
    ) -> ResourceResult<()> {
        for assoc_def in ctx.definition().association_definitions() {
            if assoc_def.direction() != AssociationDirection::ObjectToSubject {
                continue;
            }
            let subject_attr = native_name_of(ctx.definition(), assoc_def.value_attribute());
            let Some(subject_value) = object_value(subject, &subject_attr) else {
                debug!(association = %assoc_def.name(), "Subject has no value to look up entitlements by");
                continue;
            };
            let class = target_class(assoc_def)?;
            let target_def = ctx.schema().find_definition_required(class, None)?;
            let found = ctx
                .read_connector()
                .search(
                    class,
                    Some(Filter::eq(assoc_def.association_attribute(), subject_value)),
                    None,
                    None,
                )
                .await
                .map_err(|f| ResourceError::from_fault(f, "search entitlements"))?;
            let values = bean
                .associations
                .entry(assoc_def.name().to_string())
                .or_default();
            for entitlement in &found.objects {
                values.push(AssociationValue::new(entitlement_reference(target_def, entitlement)));
            }
        }
        Ok(())
    }
}

/// Bean standing in for an object that failed to convert: only its class and
/// primary identifier, so the handler can tell which object it was.
fn failed_object_bean(ctx: &ProvisioningContext, object: &ConnectorObject) -> ShadowBean {
    let bean = ShadowBean::new(object.object_class.clone()).with_resource(ctx.resource_id());
    match find_by_native_name(ctx.definition(), object.uid.attribute_name()) {
        Some(uid_def) => bean.with_attribute(uid_def.name(), vec![object.uid.value().into()]),
        None => bean,
    }
}
