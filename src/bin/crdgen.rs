//! # CRD Generator
//!
//! Prints the GitOpsDeployment CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/gitopsdeployment.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use gitops_deploy_controller::crd::GitOpsDeployment;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&GitOpsDeployment::crd())?);
    Ok(())
}
