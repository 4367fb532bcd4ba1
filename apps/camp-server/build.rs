//! Gera as informações de build (versão, compilador, perfil) usadas pelo
//! endpoint de saúde.

fn main() {
    built::write_built_file().expect("Falha ao gerar informações de build");
}
