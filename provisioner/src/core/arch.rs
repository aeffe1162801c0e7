//! Architecture token mapping for release download URLs.
//!
//! Upstream release assets (eksctl, kubectl) name Linux artifacts with Go
//! style tokens, not the kernel machine names. Unknown values pass through
//! unchanged so new architectures fail at download time with a real URL in
//! the error, not at mapping time.

/// Map a kernel machine name to the download-arch token.
pub fn download_token(machine: &str) -> &str {
    match machine {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Download-arch token for the host this process runs on.
pub fn host_token() -> &'static str {
    download_token(std::env::consts::ARCH)
}

/// Raw machine name for assets that use kernel naming (compose, AWS CLI).
pub fn host_machine() -> &'static str {
    std::env::consts::ARCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x86_64_maps_to_amd64() {
        assert_eq!(download_token("x86_64"), "amd64");
    }

    #[test]
    fn aarch64_maps_to_arm64() {
        assert_eq!(download_token("aarch64"), "arm64");
    }

    #[test]
    fn unknown_machine_passes_through() {
        assert_eq!(download_token("riscv64"), "riscv64");
        assert_eq!(download_token(""), "");
    }
}
