//! Prints the FloatingIPPool CustomResourceDefinition as YAML.

use hcloud_fip_pool_controller::FloatingIPPool;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&FloatingIPPool::crd())?);
    Ok(())
}
