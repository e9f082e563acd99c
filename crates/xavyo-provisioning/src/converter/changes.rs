//! Live synchronization and asynchronous updates.

use tracing::{debug, instrument, trace, warn};

use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::operation::{SyncChange, SyncToken};
use xavyo_resource::traits::{Connector, LiveSyncOp};

use super::conversion::{find_by_native_name, to_shadow_bean};
use super::types::{LiveSyncProgress, ResourceObjectChange};
use super::{record_fatal, ProvisioningContext, ResourceObjectConverter};
use crate::result::OperationResult;
use crate::shadow::{AbstractShadow, ResourceObjectIdentifiers};

impl ResourceObjectConverter {
    /// Token marking the current state of the resource.
    #[instrument(skip(self, ctx, result), fields(resource_id = %ctx.resource_id(), object_class = %ctx.object_class()))]
    pub async fn fetch_current_token(
        &self,
        ctx: &ProvisioningContext,
        result: &mut OperationResult,
    ) -> ResourceResult<Option<SyncToken>> {
        let sub = result.create_subresult("fetchCurrentToken");
        let live_sync = match live_sync(ctx) {
            Ok(op) => op,
            Err(e) => return Err(record_fatal(sub, e)),
        };
        match live_sync.fetch_current_token(ctx.object_class()).await {
            Ok(token) => {
                sub.record_success();
                Ok(token)
            }
            Err(fault) => Err(record_fatal(
                sub,
                ResourceError::from_fault(fault, "fetch current token"),
            )),
        }
    }

    /// Fetch changes after `token` in batches, handing each to `handler`.
    ///
    /// The handler returns `false` to stop. The returned token is the one to
    /// resume from: the token of the last handled change, or the batch token
    /// once a whole batch was handled.
    #[instrument(skip(self, ctx, token, handler, result), fields(resource_id = %ctx.resource_id(), object_class = %ctx.object_class()))]
    pub async fn fetch_changes<H>(
        &self,
        ctx: &ProvisioningContext,
        token: Option<SyncToken>,
        mut handler: H,
        result: &mut OperationResult,
    ) -> ResourceResult<LiveSyncProgress>
    where
        H: FnMut(ResourceObjectChange) -> bool + Send,
    {
        let sub = result.create_subresult("fetchChanges");
        let live_sync = match live_sync(ctx) {
            Ok(op) => op,
            Err(e) => return Err(record_fatal(sub, e)),
        };
        let batch_size = self.config().live_sync_batch_size.max(1);
        let mut progress = LiveSyncProgress {
            token,
            ..LiveSyncProgress::default()
        };

        loop {
            let batch = match live_sync
                .fetch_changes(ctx.object_class(), progress.token.as_ref(), batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(fault) => {
                    return Err(record_fatal(
                        sub,
                        ResourceError::from_fault(fault, "fetch changes"),
                    ))
                }
            };
            trace!(changes = batch.changes.len(), has_more = batch.has_more, "Fetched change batch");
            let fetched = batch.changes.len();

            for change in batch.changes {
                let change_token = change.token.clone();
                let converted = convert_change(ctx, change);
                progress.changes_processed += 1;
                if !handler(converted) {
                    debug!(processed = progress.changes_processed, "Change handler stopped fetching");
                    if change_token.is_some() {
                        progress.token = change_token;
                    }
                    sub.record_success();
                    return Ok(progress);
                }
                if change_token.is_some() {
                    progress.token = change_token;
                }
            }
            if batch.new_token.is_some() {
                progress.token = batch.new_token;
            }
            if !batch.has_more || fetched == 0 {
                break;
            }
        }

        progress.all_fetched = true;
        sub.record_success();
        Ok(progress)
    }

    /// Receive asynchronous updates until `can_run` turns false.
    ///
    /// Returns the number of changes handed to `handler`. The handler returns
    /// `false` to stop listening.
    #[instrument(skip(self, ctx, handler, can_run, result), fields(resource_id = %ctx.resource_id()))]
    pub async fn listen_for_asynchronous_updates<H, C>(
        &self,
        ctx: &ProvisioningContext,
        mut handler: H,
        can_run: C,
        result: &mut OperationResult,
    ) -> ResourceResult<usize>
    where
        H: FnMut(ResourceObjectChange) -> bool + Send,
        C: Fn() -> bool + Send + Sync,
    {
        let sub = result.create_subresult("listenForAsynchronousUpdates");
        let async_update = if ctx.capabilities().async_update {
            ctx.connector().async_update()
        } else {
            None
        };
        let Some(async_update) = async_update else {
            return Err(record_fatal(sub, ResourceError::unsupported("async update")));
        };

        let max = self.config().live_sync_batch_size.max(1) as usize;
        let wait = self.config().async_update_poll_interval();
        let mut handled = 0;
        'listen: while can_run() {
            let updates = match async_update.next_updates(max, wait).await {
                Ok(updates) => updates,
                Err(fault) => {
                    return Err(record_fatal(
                        sub,
                        ResourceError::from_fault(fault, "async update"),
                    ))
                }
            };
            for change in updates {
                if !can_run() {
                    break 'listen;
                }
                handled += 1;
                if !handler(convert_change(ctx, change)) {
                    debug!(handled, "Update handler stopped listening");
                    break 'listen;
                }
            }
        }

        sub.add_param("handled", handled);
        sub.record_success();
        Ok(handled)
    }
}

fn live_sync(ctx: &ProvisioningContext) -> ResourceResult<&dyn LiveSyncOp> {
    if !ctx.capabilities().live_sync {
        return Err(ResourceError::unsupported("live sync"));
    }
    ctx.connector()
        .live_sync()
        .ok_or_else(|| ResourceError::unsupported("live sync"))
}

/// Convert a connector change. Conversion failures are carried on the change
/// so its token still advances.
fn convert_change(ctx: &ProvisioningContext, change: SyncChange) -> ResourceObjectChange {
    let identifiers = find_by_native_name(ctx.definition(), change.uid.attribute_name())
        .map(|d| ResourceObjectIdentifiers::primary(d.name(), change.uid.value()));
    let mut converted = ResourceObjectChange {
        uid: change.uid,
        change_type: change.change_type,
        object_class: change.object_class,
        identifiers,
        resource_object: None,
        token: change.token,
        timestamp: change.timestamp,
        error: None,
    };
    let Some(object) = change.object else {
        return converted;
    };

    let bean = match to_shadow_bean(ctx, &object, true) {
        Ok(bean) => bean,
        Err(e) => {
            warn!(uid = %converted.uid, error = %e, "Cannot convert changed object");
            converted.error = Some(e.to_string());
            return converted;
        }
    };
    match AbstractShadow::new(bean.clone(), ctx.definition().clone())
        .and_then(|shadow| shadow.get_identifiers())
    {
        Ok(identifiers) => {
            if identifiers.is_some() {
                converted.identifiers = identifiers;
            }
        }
        Err(e) => {
            warn!(uid = %converted.uid, error = %e, "Changed object does not fit its definition");
            converted.error = Some(e.to_string());
        }
    }
    converted.resource_object = Some(bean);
    converted
}
