fn make_overridable_cfg(name: &str, logic: impl FnOnce() -> &'static str) -> String {
    let env_name = format!("CXA_SHIM_{}", name.to_uppercase());
    println!("cargo::rerun-if-env-changed={env_name}");
    let value = std::env::var(env_name).unwrap_or_else(|_| logic().to_string());
    println!("cargo::rustc-cfg={name}=\"{value}\"");
    value
}

fn main() {
    // Refcount underflow and unbalanced catch scopes are only diagnosed when checks are on. We
    // can't use `has_cfg("debug_assertions")` due to https://github.com/rust-lang/cargo/issues/7634,
    // so the profile name decides the default.
    println!("cargo::rerun-if-env-changed=PROFILE");
    let checks = make_overridable_cfg("protocol_checks", || {
        if std::env::var("PROFILE").unwrap_or_default() == "debug" {
            "on"
        } else {
            "off"
        }
    });
    if checks != "on" && checks != "off" {
        println!("cargo::warning=CXA_SHIM_PROTOCOL_CHECKS should be \"on\" or \"off\", got {checks:?}");
    }
}
