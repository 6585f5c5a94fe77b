//! `pgrls parse` - syntax-check a policy file.

use anyhow::Result;
use std::path::Path;

pub async fn cmd_parse(file: &Path) -> Result<i32> {
    match super::load_policy_set(file)? {
        Some(set) => {
            println!(
                "✅ Parsed {} polic{} from {}",
                set.policies.len(),
                if set.policies.len() == 1 { "y" } else { "ies" },
                file.display()
            );
            Ok(0)
        }
        None => Ok(1),
    }
}
