extern crate proc_macro;
extern crate quote;
extern crate syn;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, FieldsNamed};

// #[derive(Readable)] implements io::Readable for a fixed-layout record T whose
// body reads every member of T in declaration order and returns Ok(T {members}).
// The use site must have Readable, Buf and BspResult in scope.
#[proc_macro_derive(Readable)]
pub fn record_read_fn(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);

    let name = &ast.ident;
    let fields = match named_fields(&ast) {
        Ok(fields) => fields,
        Err(err) => return err.to_compile_error().into(),
    };
    let field_reads = fields.named.iter().map(|f| {
        let name = &f.ident;
        let ty = &f.ty;
        // Qualified so that array and generic field types need no turbofish
        quote! {
            #name: <#ty as Readable>::read(from)?
        }
    });

    let expanded = quote! {
        impl Readable for #name {
            fn read(from: &mut dyn Buf) -> BspResult<#name> {
                Ok(#name {
                    #(#field_reads, )*
                })
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}

// #[derive(Writable)] implements io::Writable for a record T whose body writes
// every member of T in declaration order.
#[proc_macro_derive(Writable)]
pub fn record_write_fn(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);

    let name = &ast.ident;
    let fields = match named_fields(&ast) {
        Ok(fields) => fields,
        Err(err) => return err.to_compile_error().into(),
    };
    let field_writes = write_generate_fields(fields);

    let expanded = quote! {
        impl Writable for #name {
            fn write(&self, to: &mut dyn BufMut) -> BspResult<()> {
                #field_writes
                Ok(())
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}

fn named_fields(ast: &DeriveInput) -> syn::Result<&FieldsNamed> {
    match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(fields),
            Fields::Unnamed(_) | Fields::Unit => Err(syn::Error::new_spanned(
                &ast.ident,
                "records need named fields to derive Readable/Writable",
            )),
        },
        Data::Enum(_) | Data::Union(_) => Err(syn::Error::new_spanned(
            &ast.ident,
            "only structs can derive Readable/Writable",
        )),
    }
}

// `self.field.write(to)?;` for each field
fn write_generate_fields(fields: &FieldsNamed) -> TokenStream {
    let field_writes = fields.named.iter().map(|f| {
        let name = &f.ident;
        quote! {
            self.#name.write(to)?
        }
    });
    quote! {
        #(#field_writes;)*
    }
}
