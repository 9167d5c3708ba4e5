use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const BIN_NAME: &str = "gestao";

// sha256("abc")
const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

const MP_HEADER: &str =
    "RELEASE_DATE;TRANSACTION_TYPE;REFERENCE_ID;TRANSACTION_NET_AMOUNT;PARTIAL_BALANCE";

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("tempdir") }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin(BIN_NAME).expect("binary exists");
        cmd.env("GESTAO_CONFIG_DIR", self.dir.path().join("config"))
            .env("HOME", self.dir.path())
            .env("NO_COLOR", "1")
            .env_remove("GESTAO_PASSWORD")
            .env_remove("GESTAO_LOG");
        cmd
    }

    fn data_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("data")
    }

    fn init(&self) {
        self.cmd()
            .args(["init", "--data-dir"])
            .arg(self.data_dir())
            .assert()
            .success()
            .stdout(contains("Initialized gestao"));
    }

    fn write_csv(&self, name: &str, rows: &[&str]) -> std::path::PathBuf {
        let path = self.dir.path().join(name);
        let mut content = format!("{MP_HEADER}\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        std::fs::write(&path, content).expect("write csv");
        path
    }

    fn import(&self, file: &Path) -> assert_cmd::assert::Assert {
        self.cmd()
            .arg("import")
            .arg(file)
            .args(["--company", "Alivvia", "--account", "Mercado Pago"])
            .assert()
    }

    /// Adds a manual entry and returns the short id printed by the command.
    fn add_manual(&self, description: &str, amount: &str) -> String {
        let output = self
            .cmd()
            .args([
                "transactions", "add", "--company", "Alivvia", "--account", "Itaú",
                "--date", "2024-03-10", "--description", description, "--amount", amount,
            ])
            .output()
            .expect("run");
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .split_whitespace()
            .nth(1)
            .expect("id in output")
            .to_string()
    }
}

#[test]
fn status_after_init_reports_empty_ledger() {
    let env = Env::new();
    env.init();
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("Transactions:  0"))
        .stdout(contains("Rules:         5"));
}

#[test]
fn commands_fail_before_init() {
    let env = Env::new();
    env.cmd()
        .args(["rules", "list"])
        .assert()
        .failure()
        .stderr(contains("gestao init"));
}

#[test]
fn reimport_inserts_nothing_new() {
    let env = Env::new();
    env.init();
    let csv = env.write_csv("mp.csv", &[
        "2024-03-01T10:00:00.000-03:00;Pix recebido;1;100,00;100,00",
        "2024-03-02T10:00:00.000-03:00;Boleto JADLOG;2;-40,00;60,00",
    ]);
    env.import(&csv)
        .success()
        .stdout(contains("2 rows in file: 2 new, 0 already imported"))
        .stdout(contains("2 auto-classified"));
    env.import(&csv)
        .success()
        .stdout(contains("2 rows in file: 0 new, 2 already imported"));
}

#[test]
fn missing_columns_fail_the_import() {
    let env = Env::new();
    env.init();
    let path = env.dir.path().join("bad.csv");
    std::fs::write(&path, "RELEASE_DATE;TRANSACTION_NET_AMOUNT\n2024-03-01;10,00\n").unwrap();
    env.import(&path)
        .failure()
        .stderr(contains("Missing mandatory columns: description, doc"));
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("Transactions:  0"));
}

#[test]
fn column_overrides_map_other_layouts() {
    let env = Env::new();
    env.init();
    let path = env.dir.path().join("bank.csv");
    std::fs::write(&path, "Data,Historico,Documento,Valor\n05/03/2024,Tarifa pacote,77,\"-12,90\"\n").unwrap();
    env.cmd()
        .arg("import")
        .arg(&path)
        .args([
            "--company", "JCA", "--account", "Itaú",
            "--date-col", "Data", "--description-col", "Historico",
            "--doc-col", "Documento", "--amount-col", "Valor",
        ])
        .assert()
        .success()
        .stdout(contains("1 new"));
    env.cmd()
        .args(["transactions", "list", "--company", "JCA", "--month", "2024-03"])
        .assert()
        .success()
        .stdout(contains("Despesas > Tarifas bancárias"))
        .stdout(contains("not_applicable"));
}

#[test]
fn unknown_company_is_rejected() {
    let env = Env::new();
    env.init();
    let csv = env.write_csv("mp.csv", &["2024-03-01;Pix recebido;1;100,00;100,00"]);
    env.cmd()
        .arg("import")
        .arg(&csv)
        .args(["--company", "Acme", "--account", "Mercado Pago"])
        .assert()
        .failure()
        .stderr(contains("unknown company"));
}

#[test]
fn ledger_consolidates_same_day_payouts() {
    let env = Env::new();
    env.init();
    let csv = env.write_csv("mp.csv", &[
        "2024-03-01T08:00:00.000-03:00;Pix recebido;1;10,00;10,00",
        "2024-03-01T09:00:00.000-03:00;Pix recebido;2;5,00;15,00",
        "2024-03-01T10:00:00.000-03:00;Pix recebido;3;2,50;17,50",
        "2024-03-02T10:00:00.000-03:00;Boleto JADLOG;4;-3,00;14,50",
    ]);
    env.import(&csv).success();

    env.cmd()
        .args(["report", "ledger", "--company", "Alivvia", "--month", "2024-03"])
        .assert()
        .success()
        .stdout(contains("Consolidated payout"))
        .stdout(contains("R$ 17,50"))
        .stdout(contains("R$ 14,50"));

    env.cmd()
        .args(["report", "dre", "--company", "Alivvia", "--month", "2024-03"])
        .assert()
        .success()
        .stdout(contains("Receita bruta"))
        .stdout(contains("Custo > Frete"))
        .stdout(contains("R$ 14,50"));
}

#[test]
fn export_ledger_writes_stable_csv() {
    let env = Env::new();
    env.init();
    let csv = env.write_csv("mp.csv", &[
        "2024-03-01;Pix recebido;1;10,00;10,00",
        "2024-03-01;Pix recebido;2;5,00;15,00",
    ]);
    env.import(&csv).success();
    let id = env.add_manual("Boleto Cometa", "-40,00");
    env.cmd()
        .args([
            "match", "save", id.as_str(), "--category", "Custo > Frete", "--supplier", "Cometa",
            "--nf", "NF 7", "--installment", "1/2",
        ])
        .assert()
        .success();
    let out = env.dir.path().join("exports").join("ledger.csv");
    env.cmd()
        .args(["export", "ledger", "--company", "Alivvia", "--month", "2024-03", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Wrote 2 rows"));

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        content,
        "date,description,category,supplier,nf,parcela,account,entrada,saida,saldo\n\
         2024-03-01,Consolidated payout,Receita > Vendas (marketplace),,,,,15.00,0.00,15.00\n\
         2024-03-10,Boleto Cometa,Custo > Frete,Cometa,NF 7,1/2,Itaú,0.00,40.00,-25.00\n"
    );
}

#[test]
fn match_save_undo_and_reopen() {
    let env = Env::new();
    env.init();
    let id = env.add_manual("Boleto Cometa", "-100,00");

    env.cmd()
        .args(["match", "queue", "--company", "Alivvia"])
        .assert()
        .success()
        .stdout(contains("Boleto Cometa"));

    env.cmd()
        .args(["match", "save", id.as_str(), "--category", "Custo > Frete", "--supplier", "Cometa", "--nf", "NF 1"])
        .assert()
        .success()
        .stdout(contains("Reconciled"));
    env.cmd()
        .args(["match", "queue", "--company", "Alivvia"])
        .assert()
        .success()
        .stdout(contains("Nothing to reconcile"));
    env.cmd()
        .args(["suppliers", "list"])
        .assert()
        .success()
        .stdout(contains("Cometa"));
    env.cmd()
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout(contains("boleto"));

    env.cmd().args(["match", "reopen", id.as_str()]).assert().success();
    env.cmd()
        .args(["match", "queue", "--company", "Alivvia"])
        .assert()
        .success()
        .stdout(contains("NF 1"));

    env.cmd().args(["match", "reopen", id.as_str()]).assert().failure().stderr(contains("not reconciled"));

    env.cmd()
        .args(["match", "save", id.as_str(), "--category", "Custo > Frete", "--nf", "NF 1"])
        .assert()
        .success();
    env.cmd().args(["match", "undo", id.as_str()]).assert().success();
    env.cmd()
        .args(["match", "queue", "--company", "Alivvia"])
        .assert()
        .success()
        .stdout(contains("Boleto Cometa"))
        .stdout(contains("NF 1").not());
}

#[test]
fn inbound_transactions_cannot_be_matched() {
    let env = Env::new();
    env.init();
    let id = env.add_manual("Venda balcão", "250,00");
    env.cmd()
        .args(["match", "save", id.as_str(), "--category", "Outros"])
        .assert()
        .failure()
        .stderr(contains("inbound"));
}

#[test]
fn match_requires_category() {
    let env = Env::new();
    env.init();
    let id = env.add_manual("Boleto", "-1,00");
    env.cmd()
        .args(["match", "save", id.as_str(), "--category", "  "])
        .assert()
        .failure()
        .stderr(contains("category is required"));
}

#[test]
fn erase_removes_manual_entry() {
    let env = Env::new();
    env.init();
    let id = env.add_manual("Aluguel", "-1.500,00");
    env.cmd().args(["transactions", "erase", id.as_str()]).assert().success();
    env.cmd()
        .args(["transactions", "list"])
        .assert()
        .success()
        .stdout(contains("No transactions found"));
}

#[test]
fn wipe_requires_confirmation() {
    let env = Env::new();
    env.init();
    env.add_manual("Aluguel", "-10");
    env.cmd().arg("wipe").assert().failure().stderr(contains("--yes"));
    env.cmd()
        .args(["wipe", "--yes"])
        .assert()
        .success()
        .stdout(contains("Removed 1 transactions"));
    env.cmd()
        .args(["categories", "list"])
        .assert()
        .success()
        .stdout(contains("Custo > Frete"));
}

#[test]
fn backup_writes_copy() {
    let env = Env::new();
    env.init();
    let out = env.dir.path().join("copy.db");
    env.cmd()
        .args(["backup", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Backup saved"));
    assert!(out.exists());
}

#[test]
fn password_gate() {
    let env = Env::new();
    let config = env.dir.path().join("config");
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(
        config.join("settings.json"),
        format!(
            "{{\"data_dir\": {:?}, \"password_sha256\": \"{ABC_SHA256}\"}}",
            env.data_dir().to_string_lossy()
        ),
    )
    .unwrap();

    env.cmd()
        .args(["--password", "wrong", "status"])
        .assert()
        .failure()
        .stderr(contains("Incorrect password"));
    env.cmd()
        .args(["init", "--password", "abc"])
        .assert()
        .success();
    env.cmd()
        .arg("status")
        .env("GESTAO_PASSWORD", "abc")
        .assert()
        .success()
        .stdout(contains("Password:   required"));
}
