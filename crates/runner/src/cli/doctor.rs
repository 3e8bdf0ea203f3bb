use adaptor_domain::config::ConfigSeverity;
use adaptor_domain::Config;

/// Runs every diagnostic check and prints a summary. Returns `Ok(true)`
/// only if every check passed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("adaptor-runner doctor");
    println!("=====================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_saml_keys(config, &mut all_passed);
    check_tls_files(config, &mut all_passed);
    check_appliance_reachable(config, &mut all_passed).await;

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate_report();
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_saml_keys(config: &Config, all_passed: &mut bool) {
    let checks = [
        ("saml.sp_key_path", &config.saml.sp_key_path),
        ("saml.sp_cert_path", &config.saml.sp_cert_path),
        ("saml.idp_cert_path", &config.saml.idp_cert_path),
    ];
    for (label, path) in checks {
        let readable = std::fs::read_to_string(path).is_ok();
        print_check(label, readable, path.clone());
        if !readable {
            *all_passed = false;
        }
    }
}

fn check_tls_files(config: &Config, all_passed: &mut bool) {
    let Some(tls) = &config.server.tls else {
        print_check("server.tls", true, "not configured, listener serves plain HTTP".into());
        return;
    };

    let mut checks = vec![
        ("server.tls.cert_path", tls.cert_path.clone()),
        ("server.tls.key_path", tls.key_path.clone()),
    ];
    if let Some(trust_store) = &tls.client_trust_store_path {
        checks.push(("server.tls.client_trust_store_path", trust_store.clone()));
    }
    for (label, path) in checks {
        let readable = std::fs::read_to_string(&path).is_ok();
        print_check(label, readable, path);
        if !readable {
            *all_passed = false;
        }
    }
}

async fn check_appliance_reachable(config: &Config, all_passed: &mut bool) {
    let url = config.appliance.feed_url();
    let reachable = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(client) => client.head(&url).send().await.is_ok(),
        Err(_) => false,
    };

    print_check(
        "Appliance feed endpoint reachable",
        reachable,
        if reachable {
            url
        } else {
            format!("{url} (unreachable — this is informational only, the Appliance may simply reject HEAD)")
        },
    );
    // Unlike the other checks this one is informational: the Appliance
    // commonly rejects a bare HEAD, so it never fails the overall run.
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
