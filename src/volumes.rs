//! Anonymous volume generation for `auto` volume declarations.

use crate::engine::ContainerEngine;
use crate::pipeline::{DeployError, DeployStep, LeftBehind};
use crate::template::VolumeDeclaration;
use crate::{log_error, log_info};

/// Number of declarations the orchestrator must back with a generated volume.
pub fn required_count(declarations: &[VolumeDeclaration]) -> usize {
    declarations
        .iter()
        .filter(|v| v.needs_generated_volume())
        .count()
}

/// Create exactly `count` anonymous local volumes and return their ids in creation order.
///
/// An engine that reports a different number of volumes than requested is treated as a
/// provisioning failure; whatever it did create is listed in the error.
pub async fn provision(
    engine: &dyn ContainerEngine,
    count: usize,
) -> Result<Vec<String>, DeployError> {
    if count == 0 {
        return Ok(Vec::new());
    }

    log_info!("Provisioning {} generated volume(s) on {}", count, engine.name());

    let volumes = engine.create_anonymous_volumes(count).await.map_err(|e| {
        log_error!("Volume provisioning failed: {}", e);
        DeployError::provisioning(
            DeployStep::ProvisionVolumes,
            e.to_string(),
            LeftBehind::default(),
        )
    })?;

    let ids: Vec<String> = volumes.into_iter().map(|v| v.id).collect();
    if ids.len() != count {
        log_error!(
            "Engine created {} volume(s), {} were requested",
            ids.len(),
            count
        );
        return Err(DeployError::provisioning(
            DeployStep::ProvisionVolumes,
            format!("expected {} generated volumes, engine created {}", count, ids.len()),
            LeftBehind {
                volumes: ids,
                ..LeftBehind::default()
            },
        ));
    }

    Ok(ids)
}
